//! Payment gateway service
//!
//! Ties the Airtel provider to the host's ledger, user directory and the
//! tracking table. The HTTP handlers are thin wrappers around this type.

use crate::error::{AppError, AppResult, DomainError};
use crate::events::{RequestLog, RequestLogSink};
use crate::logging::mask_msisdn;
use crate::config::SUPPORTED_CURRENCIES;
use crate::payments::codes::{dp_message, esb_message, ta_message, ESB_SOMETHING_WENT_WRONG};
use crate::payments::types::{AirtelEnvironment, CallbackPayload, PaymentRequest};
use crate::payments::{PaymentProvider, TransactionStatus};
use crate::services::host::{
    NewPayment, NewTrackedTransaction, Payable, PayableRef, PaymentLedger, TrackedTransaction,
    TransactionStore, UserDirectory, GATEWAY_NAME,
};
use crate::services::poller::{poll_until_settled, PollConfig, PollOutcome, CheckStatus};
use crate::services::pricing::rounded_cost;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Transaction id returned when a payment could not be started
pub const NO_TRANSACTION: &str = "0";

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub environment: AirtelEnvironment,
    /// Percent added on top of the payable amount
    pub surcharge: u32,
    /// Merchant country, sent as `X-Country`
    pub merchant_country: String,
    pub poll: PollConfig,
}

/// Everything a checkout page needs before starting a payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(with = "rust_decimal::serde::float")]
    pub cost: Decimal,
    pub currency: String,
    /// Payer's phone, `None` when the profile holds no usable number
    pub phone: Option<String>,
    pub country: Option<String>,
    pub merchant_country: String,
    pub reference: String,
    pub poll_steps: u32,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartTransaction {
    #[serde(flatten)]
    pub payable: PayableRef,
    pub user_id: i64,
    pub reference: String,
    pub phone: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartResult {
    /// Airtel's transaction id, or `"0"` when the push was not accepted
    pub transaction_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionResult {
    pub success: bool,
    pub status: TransactionStatus,
    pub message: String,
}

impl CompletionResult {
    fn of(success: bool, status: TransactionStatus) -> Self {
        Self {
            message: ta_message(status.code()).to_string(),
            success,
            status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundResult {
    pub success: bool,
    pub airtel_money_id: Option<String>,
    pub message: String,
}

pub struct GatewayService {
    provider: Arc<dyn PaymentProvider>,
    ledger: Arc<dyn PaymentLedger>,
    users: Arc<dyn UserDirectory>,
    store: Arc<dyn TransactionStore>,
    events: Arc<dyn RequestLogSink>,
    settings: GatewaySettings,
}

impl GatewayService {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        ledger: Arc<dyn PaymentLedger>,
        users: Arc<dyn UserDirectory>,
        store: Arc<dyn TransactionStore>,
        events: Arc<dyn RequestLogSink>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            provider,
            ledger,
            users,
            store,
            events,
            settings,
        }
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn TransactionStore> {
        &self.store
    }

    /// Cost, currency and payer details for the checkout page
    pub async fn config_for_client(
        &self,
        payable_ref: &PayableRef,
        user_id: i64,
    ) -> AppResult<ClientConfig> {
        let payable = self.ledger.get_payable(payable_ref).await?;
        ensure_supported_currency(&payable)?;
        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or(DomainError::UserNotFound { user_id })?;

        Ok(ClientConfig {
            cost: rounded_cost(payable.amount, &payable.currency, self.settings.surcharge),
            currency: payable.currency,
            phone: user.payment_phone(),
            country: user.country_code(),
            merchant_country: self.settings.merchant_country.clone(),
            reference: format!(
                "{} {} {} {}",
                payable_ref.component, payable_ref.payment_area, payable_ref.item_id, user_id
            ),
            poll_steps: self.settings.poll.steps,
            poll_interval_ms: self.settings.poll.interval.as_millis() as u64,
        })
    }

    /// Push a payment prompt to the payer's phone
    ///
    /// Provider failures never surface as errors: the caller gets transaction id
    /// `"0"` and the matching ESB message.
    #[instrument(skip(self, request), fields(item_id = request.payable.item_id, user_id = request.user_id))]
    pub async fn start_transaction(&self, request: StartTransaction) -> AppResult<StartResult> {
        let msisdn: String = request.phone.chars().filter(|c| c.is_ascii_digit()).collect();
        if msisdn.len() <= 5 {
            return Err(AppError::invalid_input("phone", "not a usable phone number"));
        }
        let country = request.country.trim().to_uppercase();
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AppError::invalid_input("country", "expected a two-letter country code"));
        }

        let payable = self.ledger.get_payable(&request.payable).await?;
        ensure_supported_currency(&payable)?;
        let cost = rounded_cost(payable.amount, &payable.currency, self.settings.surcharge);
        let transaction_id = generate_transaction_id();

        info!(
            transaction_id = %transaction_id,
            msisdn = %mask_msisdn(&msisdn),
            cost = %cost,
            currency = %payable.currency,
            "Starting Airtel transaction"
        );

        let response = self
            .provider
            .request_payment(PaymentRequest {
                transaction_id: transaction_id.clone(),
                reference: request.reference.clone(),
                amount: cost,
                currency: payable.currency.clone(),
                msisdn,
                subscriber_country: country,
            })
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(transaction_id = %transaction_id, error = %e, "Payment request failed");
                return Ok(StartResult {
                    transaction_id: NO_TRANSACTION.to_string(),
                    message: esb_message(ESB_SOMETHING_WENT_WRONG).to_string(),
                });
            }
        };

        let message = esb_message(
            response
                .result_code
                .as_deref()
                .unwrap_or(ESB_SOMETHING_WENT_WRONG),
        )
        .to_string();

        if !response.is_accepted() {
            info!(
                transaction_id = %transaction_id,
                code = %response.code,
                result_code = ?response.result_code,
                "Payment request not accepted"
            );
            return Ok(StartResult {
                transaction_id: NO_TRANSACTION.to_string(),
                message,
            });
        }

        let airtel_id = response.transaction_id.unwrap_or(transaction_id);
        self.store
            .insert(NewTrackedTransaction {
                transaction_id: airtel_id.clone(),
                item_id: request.payable.item_id,
                component: request.payable.component,
                payment_area: request.payable.payment_area,
                user_id: request.user_id,
            })
            .await?;

        Ok(StartResult {
            transaction_id: airtel_id,
            message,
        })
    }

    /// Check a started transaction and record the payment once Airtel reports success
    ///
    /// Safe to call repeatedly: a completed row answers `TS` without asking Airtel again.
    #[instrument(skip(self, payable_ref))]
    pub async fn complete_transaction(
        &self,
        payable_ref: &PayableRef,
        transaction_id: &str,
        user_id: i64,
    ) -> AppResult<CompletionResult> {
        let row = match self.store.find_by_transaction_id(transaction_id).await? {
            Some(row) if row.user_id == user_id && tracked_payable(&row) == *payable_ref => row,
            Some(_) => {
                warn!("Tracking row does not belong to this user or item");
                return Ok(CompletionResult::of(false, TransactionStatus::Failed));
            }
            None => return Ok(CompletionResult::of(false, TransactionStatus::Failed)),
        };

        if row.is_completed() {
            return Ok(if self.resume_delivery(&row).await? {
                CompletionResult::of(true, TransactionStatus::Success)
            } else {
                CompletionResult::of(false, TransactionStatus::InProgress)
            });
        }

        let payable = self.ledger.get_payable(&tracked_payable(&row)).await?;
        let enquiry = match self
            .provider
            .transaction_enquiry(transaction_id, &payable.currency)
            .await
        {
            Ok(enquiry) => enquiry,
            Err(e) => {
                warn!(error = %e, "Transaction enquiry failed");
                return Ok(CompletionResult::of(false, TransactionStatus::InProgress));
            }
        };

        let status = match enquiry.settled_status() {
            Some(status) => status.clone(),
            None => {
                if let Some(code) = enquiry.response_code.as_deref() {
                    info!(
                        response_code = code,
                        reason = dp_message(code),
                        "Transaction not settled"
                    );
                }
                return Ok(CompletionResult::of(false, TransactionStatus::InProgress));
            }
        };

        if status == TransactionStatus::Success {
            self.settle(&row, &payable, enquiry.airtel_money_id.as_deref())
                .await?;
        }

        Ok(CompletionResult::of(true, status))
    }

    /// Handle an Airtel callback
    ///
    /// Only `TS` callbacks for known transactions do anything, and only after an
    /// enquiry confirms the status.
    pub async fn handle_callback(&self, payload: CallbackPayload) -> AppResult<()> {
        let transaction = payload.transaction;
        self.events
            .record(RequestLog::callback(serde_json::json!({
                "id": transaction.id,
                "message": transaction.message,
                "status_code": transaction.status_code,
                "airtel_money_id": transaction.airtel_money_id,
            })))
            .await;

        if TransactionStatus::from(transaction.status_code.as_str()) != TransactionStatus::Success
        {
            return Ok(());
        }

        let row = match self.store.find_by_transaction_id(&transaction.id).await? {
            Some(row) => row,
            None => {
                info!(transaction_id = %transaction.id, "Callback for unknown transaction ignored");
                return Ok(());
            }
        };
        if row.is_completed() {
            self.resume_delivery(&row).await?;
            return Ok(());
        }

        let payable = self.ledger.get_payable(&tracked_payable(&row)).await?;
        let enquiry = self
            .provider
            .transaction_enquiry(&transaction.id, &payable.currency)
            .await?;

        match enquiry.settled_status() {
            Some(TransactionStatus::Success) => {
                let money_id = enquiry
                    .airtel_money_id
                    .as_deref()
                    .or(transaction.airtel_money_id.as_deref());
                self.settle(&row, &payable, money_id).await?;
            }
            other => {
                warn!(
                    transaction_id = %transaction.id,
                    status = ?other,
                    "Callback reported success but enquiry disagrees"
                );
            }
        }

        Ok(())
    }

    /// Refund a completed transaction
    pub async fn refund(&self, transaction_id: &str) -> AppResult<RefundResult> {
        let row = self
            .store
            .find_by_transaction_id(transaction_id)
            .await?
            .ok_or_else(|| DomainError::TransactionNotFound {
                transaction_id: transaction_id.to_string(),
            })?;

        let money_id = match (&row.completed_at, &row.money_id) {
            (Some(_), Some(money_id)) => money_id.clone(),
            _ => {
                return Err(AppError::invalid_input(
                    "transaction_id",
                    "only completed transactions can be refunded",
                ))
            }
        };

        let payable = self.ledger.get_payable(&tracked_payable(&row)).await?;
        let response = self.provider.refund(&money_id, &payable.currency).await?;
        let success = response.code == "200" && response.success;

        info!(transaction_id, success, "Airtel refund requested");
        Ok(RefundResult {
            success,
            airtel_money_id: response.airtel_money_id,
            message: esb_message(
                response
                    .result_code
                    .as_deref()
                    .unwrap_or(ESB_SOMETHING_WENT_WRONG),
            )
            .to_string(),
        })
    }

    /// Poll [`Self::complete_transaction`] until the transaction settles
    pub async fn await_transaction(
        &self,
        payable_ref: &PayableRef,
        transaction_id: &str,
        user_id: i64,
        shutdown: watch::Receiver<bool>,
    ) -> PollOutcome {
        poll_until_settled(
            &self.settings.poll,
            |_| async move {
                let result = self
                    .complete_transaction(payable_ref, transaction_id, user_id)
                    .await?;
                Ok(CheckStatus {
                    status: result.status,
                    message: result.message,
                })
            },
            shutdown,
        )
        .await
    }

    /// Record the payment and close the tracking row
    async fn settle(
        &self,
        row: &TrackedTransaction,
        payable: &Payable,
        money_id: Option<&str>,
    ) -> AppResult<()> {
        if !self
            .store
            .mark_completed(&row.transaction_id, money_id)
            .await?
        {
            info!(transaction_id = %row.transaction_id, "Transaction already completed");
            return Ok(());
        }

        let payable_ref = tracked_payable(row);
        let payment = NewPayment {
            account_id: payable.account_id,
            component: row.component.clone(),
            payment_area: row.payment_area.clone(),
            item_id: row.item_id,
            user_id: row.user_id,
            amount: rounded_cost(payable.amount, &payable.currency, self.settings.surcharge),
            currency: payable.currency.clone(),
            gateway: GATEWAY_NAME.to_string(),
        };

        let payment_id = match self.ledger.save_payment(&payment).await {
            Ok(id) => id,
            Err(e) => {
                error!(transaction_id = %row.transaction_id, error = %e, "Saving payment failed");
                if let Err(reopen) = self.store.reopen(&row.transaction_id).await {
                    error!(error = %reopen, "Reopening tracking row failed");
                }
                return Err(e);
            }
        };

        // The payment exists from here on; the row must not be reopened or it would be paid twice.
        if let Err(e) = self.store.set_payment_id(&row.transaction_id, payment_id).await {
            error!(
                transaction_id = %row.transaction_id,
                payment_id,
                error = %e,
                "Recording payment id on tracking row failed"
            );
        }

        self.deliver(row, &payable_ref, payment_id).await?;
        info!(
            transaction_id = %row.transaction_id,
            payment_id,
            user_id = row.user_id,
            "Airtel payment recorded and order delivered"
        );
        Ok(())
    }

    /// Hand the item over and mark the row delivered
    async fn deliver(
        &self,
        row: &TrackedTransaction,
        payable_ref: &PayableRef,
        payment_id: i64,
    ) -> AppResult<()> {
        if let Err(e) = self
            .ledger
            .deliver_order(payable_ref, payment_id, row.user_id)
            .await
        {
            error!(
                transaction_id = %row.transaction_id,
                payment_id,
                error = %e,
                "Order delivery failed, will retry on next check"
            );
            return Err(e);
        }
        self.store.mark_delivered(&row.transaction_id).await
    }

    /// Finish a completed row whose order was never delivered
    ///
    /// Returns `false` when delivery cannot be retried yet because the row has
    /// no payment id (settlement still running, or the id was never recorded).
    async fn resume_delivery(&self, row: &TrackedTransaction) -> AppResult<bool> {
        if row.is_delivered() {
            return Ok(true);
        }
        match row.payment_id {
            Some(payment_id) => {
                info!(transaction_id = %row.transaction_id, payment_id, "Retrying order delivery");
                self.deliver(row, &tracked_payable(row), payment_id).await?;
                Ok(true)
            }
            None => {
                warn!(
                    transaction_id = %row.transaction_id,
                    "Completed transaction has no payment id yet"
                );
                Ok(false)
            }
        }
    }
}

/// Reject currencies the gateway does not collect in
fn ensure_supported_currency(payable: &Payable) -> AppResult<()> {
    let currency = payable.currency.to_uppercase();
    if SUPPORTED_CURRENCIES.contains(&currency.as_str()) {
        Ok(())
    } else {
        Err(DomainError::UnsupportedCurrency { currency }.into())
    }
}

fn tracked_payable(row: &TrackedTransaction) -> PayableRef {
    PayableRef {
        component: row.component.clone(),
        payment_area: row.payment_area.clone(),
        item_id: row.item_id,
    }
}

/// Random ten-digit transaction id
fn generate_transaction_id() -> String {
    (Uuid::new_v4().as_u128() % 9_000_000_000 + 1_000_000_000).to_string()
}
