//! In-memory collaborators for service and handler tests

use crate::error::{AppError, AppResult, DomainError};
use crate::events::{RequestLog, RequestLogSink};
use crate::payments::types::{AirtelEnvironment, EnquiryResponse, PaymentRequest, PaymentResponse, RefundResponse};
use crate::payments::{PaymentProvider, TransactionStatus};
use crate::services::gateway::{GatewayService, GatewaySettings, StartTransaction};
use crate::services::host::{
    NewPayment, NewTrackedTransaction, Payable, PayableRef, PaymentLedger, TrackedTransaction,
    TransactionStore, User, UserDirectory,
};
use crate::services::poller::PollConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
pub struct FakeProvider {
    pub payment: Mutex<Option<AppResult<PaymentResponse>>>,
    pub enquiries: Mutex<VecDeque<AppResult<EnquiryResponse>>>,
    pub requests: Mutex<Vec<PaymentRequest>>,
    pub refunds: Mutex<Vec<String>>,
    pub reject_signatures: AtomicBool,
}

impl FakeProvider {
    pub fn accept_payment(&self, id: &str) {
        *self.payment.lock().unwrap() = Some(Ok(PaymentResponse {
            transaction_id: Some(id.to_string()),
            status: Some("SUCCESS".to_string()),
            code: "200".to_string(),
            result_code: Some("ESB000010".to_string()),
            response_code: None,
            success: true,
            message: None,
        }));
    }

    pub fn push_enquiry(&self, status: &str) {
        self.enquiries.lock().unwrap().push_back(Ok(EnquiryResponse {
            transaction_id: Some("1234567890".to_string()),
            airtel_money_id: Some("MP210603.1234.L06941".to_string()),
            status: Some(TransactionStatus::from(status)),
            message: None,
            code: "200".to_string(),
            result_code: Some("ESB000010".to_string()),
            response_code: None,
            success: true,
        }));
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn request_payment(&self, request: PaymentRequest) -> AppResult<PaymentResponse> {
        self.requests.lock().unwrap().push(request);
        self.payment
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(AppError::provider("unreachable", true)))
    }

    async fn transaction_enquiry(&self, _: &str, _: &str) -> AppResult<EnquiryResponse> {
        self.enquiries
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::provider("unreachable", true)))
    }

    async fn refund(&self, airtel_money_id: &str, _: &str) -> AppResult<RefundResponse> {
        self.refunds.lock().unwrap().push(airtel_money_id.to_string());
        Ok(RefundResponse {
            airtel_money_id: Some(airtel_money_id.to_string()),
            status: Some("SUCCESS".to_string()),
            code: "200".to_string(),
            result_code: Some("ESB000010".to_string()),
            success: true,
        })
    }

    fn validate_webhook_signature(&self, _: &[u8], _: Option<&str>) -> bool {
        !self.reject_signatures.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeLedger {
    pub payments: Mutex<Vec<NewPayment>>,
    pub deliveries: Mutex<Vec<(i64, i64)>>,
    /// Number of upcoming `save_payment` calls that fail
    pub failing_saves: AtomicU32,
    /// Number of upcoming `deliver_order` calls that fail
    pub failing_deliveries: AtomicU32,
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl PaymentLedger for FakeLedger {
    async fn get_payable(&self, payable: &PayableRef) -> AppResult<Payable> {
        if payable.item_id == 404 {
            return Err(DomainError::PayableNotFound {
                component: payable.component.clone(),
                payment_area: payable.payment_area.clone(),
                item_id: payable.item_id,
            }
            .into());
        }
        let currency = if payable.item_id == 978 { "EUR" } else { "UGX" };
        Ok(Payable {
            account_id: 7,
            amount: dec!(1000),
            currency: currency.to_string(),
        })
    }

    async fn save_payment(&self, payment: &NewPayment) -> AppResult<i64> {
        if take_failure(&self.failing_saves) {
            return Err(AppError::configuration("payments table unavailable"));
        }
        let mut payments = self.payments.lock().unwrap();
        payments.push(payment.clone());
        Ok(payments.len() as i64)
    }

    async fn deliver_order(&self, _: &PayableRef, payment_id: i64, user_id: i64) -> AppResult<()> {
        if take_failure(&self.failing_deliveries) {
            return Err(AppError::configuration("enrolment service unavailable"));
        }
        self.deliveries.lock().unwrap().push((payment_id, user_id));
        Ok(())
    }
}

pub struct FakeUsers;

#[async_trait]
impl UserDirectory for FakeUsers {
    async fn get_user(&self, user_id: i64) -> AppResult<Option<User>> {
        Ok((user_id == 2).then(|| User {
            id: 2,
            phone1: None,
            phone2: Some("+256 772 123 456".to_string()),
            country: Some("ug".to_string()),
        }))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub rows: Mutex<HashMap<String, TrackedTransaction>>,
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert(&self, t: NewTrackedTransaction) -> AppResult<TrackedTransaction> {
        let row = TrackedTransaction {
            id: Uuid::new_v4(),
            transaction_id: t.transaction_id.clone(),
            money_id: None,
            payment_id: None,
            item_id: t.item_id,
            component: t.component,
            payment_area: t.payment_area,
            user_id: t.user_id,
            created_at: Utc::now(),
            completed_at: None,
            delivered_at: None,
        };
        self.rows.lock().unwrap().insert(t.transaction_id, row.clone());
        Ok(row)
    }

    async fn find_by_transaction_id(&self, id: &str) -> AppResult<Option<TrackedTransaction>> {
        Ok(self.rows.lock().unwrap().get(id).cloned())
    }

    async fn mark_completed(&self, id: &str, money_id: Option<&str>) -> AppResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(id) {
            Some(row) if row.completed_at.is_none() => {
                row.completed_at = Some(Utc::now());
                row.money_id = money_id.map(String::from);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_payment_id(&self, id: &str, payment_id: i64) -> AppResult<()> {
        if let Some(row) = self.rows.lock().unwrap().get_mut(id) {
            row.payment_id = Some(payment_id);
        }
        Ok(())
    }

    async fn mark_delivered(&self, id: &str) -> AppResult<()> {
        if let Some(row) = self.rows.lock().unwrap().get_mut(id) {
            row.delivered_at.get_or_insert_with(Utc::now);
        }
        Ok(())
    }

    async fn reopen(&self, id: &str) -> AppResult<()> {
        if let Some(row) = self.rows.lock().unwrap().get_mut(id) {
            row.completed_at = None;
            row.delivered_at = None;
            row.money_id = None;
            row.payment_id = None;
        }
        Ok(())
    }

    async fn delete_incomplete_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|_, r| r.completed_at.is_some() || r.created_at >= cutoff);
        Ok((before - rows.len()) as u64)
    }

    async fn find_by_user_id(&self, user_id: i64) -> AppResult<Vec<TrackedTransaction>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_by_user_id(&self, user_id: i64) -> AppResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|_, r| r.user_id != user_id);
        Ok((before - rows.len()) as u64)
    }

    async fn delete_by_payment_ids(&self, ids: &[i64]) -> AppResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|_, r| !r.payment_id.map_or(false, |p| ids.contains(&p)));
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<RequestLog>>,
}

#[async_trait]
impl RequestLogSink for RecordingSink {
    async fn record(&self, event: RequestLog) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct Harness {
    pub provider: Arc<FakeProvider>,
    pub ledger: Arc<FakeLedger>,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<RecordingSink>,
    pub service: Arc<GatewayService>,
}

pub fn harness() -> Harness {
    let provider = Arc::new(FakeProvider::default());
    let ledger = Arc::new(FakeLedger::default());
    let store = Arc::new(MemoryStore::default());
    let sink = Arc::new(RecordingSink::default());
    let service = Arc::new(GatewayService::new(
        provider.clone(),
        ledger.clone(),
        Arc::new(FakeUsers),
        store.clone(),
        sink.clone(),
        GatewaySettings {
            environment: AirtelEnvironment::Sandbox,
            surcharge: 3,
            merchant_country: "UG".to_string(),
            poll: PollConfig {
                steps: 10,
                interval: Duration::from_secs(18),
            },
        },
    ));
    Harness {
        provider,
        ledger,
        store,
        sink,
        service,
    }
}

pub fn course() -> PayableRef {
    PayableRef {
        component: "enrol_fee".to_string(),
        payment_area: "fee".to_string(),
        item_id: 5,
    }
}

pub fn start_request() -> StartTransaction {
    StartTransaction {
        payable: course(),
        user_id: 2,
        reference: "enrol_fee fee 5 2".to_string(),
        phone: "772 123 456".to_string(),
        country: "ug".to_string(),
    }
}

pub async fn tracked(h: &Harness, id: &str) {
    h.store
        .insert(NewTrackedTransaction {
            transaction_id: id.to_string(),
            item_id: 5,
            component: "enrol_fee".to_string(),
            payment_area: "fee".to_string(),
            user_id: 2,
        })
        .await
        .unwrap();
}
