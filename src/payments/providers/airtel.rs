//! Airtel Africa collection API provider
//!
//! Talks to the Airtel Africa Open API: OAuth2 client-credentials tokens,
//! USSD push payments, transaction enquiry and refunds. Every call is
//! recorded through a [`RequestLogSink`].

use crate::config::AirtelConfig;
use crate::error::{AppError, AppErrorKind, AppResult, ExternalError};
use crate::events::{RequestLog, RequestLogSink, TracingLogSink};
use crate::payments::token::{effective_ttl, MemoryTokenStore, TokenStore};
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{
    AirtelEnvelope, AirtelEnvironment, AirtelStatus, AirtelTransaction, EnquiryResponse, PaymentRequest,
    PaymentResponse, RefundResponse, TransactionStatus,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const PROVIDER: &str = "Airtel Africa";
const TOKEN_PATH: &str = "auth/oauth2/token";
const PAYMENT_PATH: &str = "merchant/v1/payments/";
const ENQUIRY_PATH: &str = "standard/v1/payments/";
const REFUND_PATH: &str = "standard/v1/payments/refund";

/// Airtel provider configuration
#[derive(Debug, Clone)]
pub struct AirtelProviderConfig {
    pub environment: AirtelEnvironment,
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Merchant country, sent as `X-Country`
    pub country: String,
    pub timeout_secs: u64,
    pub callback_key: Option<String>,
}

impl Default for AirtelProviderConfig {
    fn default() -> Self {
        Self {
            environment: AirtelEnvironment::Sandbox,
            base_url: AirtelEnvironment::Sandbox.base_url().to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            country: "UG".to_string(),
            timeout_secs: 30,
            callback_key: None,
        }
    }
}

impl From<&AirtelConfig> for AirtelProviderConfig {
    fn from(config: &AirtelConfig) -> Self {
        Self {
            environment: config.environment,
            base_url: config.base_url(),
            client_id: config.active_client_id().to_string(),
            client_secret: config.active_secret().to_string(),
            country: config.country.clone(),
            timeout_secs: config.timeout_secs,
            callback_key: config.callback_key.clone(),
        }
    }
}

/// Airtel Africa payment provider
pub struct AirtelProvider {
    config: AirtelProviderConfig,
    client: Client,
    tokens: Arc<dyn TokenStore>,
    events: Arc<dyn RequestLogSink>,
}

impl AirtelProvider {
    pub fn new(config: AirtelProviderConfig) -> AppResult<Self> {
        Self::with_stores(
            config,
            Arc::new(MemoryTokenStore::new()),
            Arc::new(TracingLogSink),
        )
    }

    pub fn with_stores(
        mut config: AirtelProviderConfig,
        tokens: Arc<dyn TokenStore>,
        events: Arc<dyn RequestLogSink>,
    ) -> AppResult<Self> {
        if !config.base_url.ends_with('/') {
            config.base_url.push('/');
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AppError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            config,
            client,
            tokens,
            events,
        })
    }

    pub fn environment(&self) -> AirtelEnvironment {
        self.config.environment
    }

    pub fn country(&self) -> &str {
        &self.config.country
    }

    fn location(&self, path: &str) -> String {
        format!("{}:{}", self.config.environment.label(), path)
    }

    /// Current bearer token, fetched from Airtel on a cache miss
    async fn bearer_token(&self) -> AppResult<String> {
        if let Some(token) = self.tokens.get().await {
            return Ok(token);
        }

        let url = format!("{}{}", self.config.base_url, TOKEN_PATH);
        let body = json!({
            "client_id": self.config.client_id,
            "client_secret": self.config.client_secret,
            "grant_type": "client_credentials",
        });

        debug!("Requesting Airtel access token");
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "*/*")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Airtel token request failed: {}", e);
                AppError::from(e)
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let payload: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
        self.events
            .record(RequestLog::outbound(
                "POST",
                self.location(TOKEN_PATH),
                payload.clone(),
            ))
            .await;

        if !status.is_success() {
            error!("Airtel token request rejected: HTTP {}", status);
            return Err(AppError::provider(
                format!("Token request rejected with HTTP {}", status),
                status.is_server_error(),
            ));
        }

        let token: TokenResponse = serde_json::from_value(payload).map_err(|e| {
            AppError::provider(format!("Invalid token response: {}", e), false)
        })?;

        let ttl = effective_ttl(Duration::from_secs(token.expires_in_secs()));
        self.tokens.put(&token.access_token, ttl).await;
        info!(ttl_secs = ttl.as_secs(), "Airtel access token acquired");
        Ok(token.access_token)
    }

    /// Make an authenticated request to the Airtel API
    ///
    /// A `401` evicts the cached token and the call is repeated once with a fresh one.
    async fn make_request(
        &self,
        method: Method,
        path: &str,
        currency: &str,
        body: Option<&serde_json::Value>,
    ) -> AppResult<AirtelEnvelope<AirtelTransaction>> {
        let url = format!("{}{}", self.config.base_url, path);

        for attempt in 0..2 {
            let token = self.bearer_token().await?;
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header("Content-Type", "application/json")
                .header("Accept", "*/*")
                .header("X-Country", &self.config.country)
                .header("X-Currency", currency)
                .header("Authorization", format!("Bearer {}", token));

            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await.map_err(|e| {
                error!("Airtel request {} {} failed: {}", method, path, e);
                AppError::from(e)
            })?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && attempt == 0 {
                warn!("Airtel rejected the access token, requesting a new one");
                self.tokens.evict().await;
                continue;
            }

            let text = response.text().await.unwrap_or_default();
            let payload: serde_json::Value =
                serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);
            self.events
                .record(RequestLog::outbound(
                    method.as_str(),
                    self.location(path),
                    payload.clone(),
                ))
                .await;

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(AppError::new(AppErrorKind::External(
                    ExternalError::RateLimit {
                        service: PROVIDER.to_string(),
                        retry_after: None,
                    },
                )));
            }

            // Airtel reports business failures inside the envelope, whatever the HTTP status.
            return match serde_json::from_value::<AirtelEnvelope<AirtelTransaction>>(payload) {
                Ok(envelope) if envelope.status.is_some() => Ok(envelope),
                Ok(_) | Err(_) => {
                    error!("Unexpected Airtel response: HTTP {}", status);
                    Err(AppError::provider(
                        format!("HTTP {}: unexpected response body", status),
                        status.is_server_error(),
                    ))
                }
            };
        }

        Err(AppError::provider("Access token rejected twice", false))
    }
}

#[async_trait]
impl PaymentProvider for AirtelProvider {
    async fn request_payment(&self, request: PaymentRequest) -> AppResult<PaymentResponse> {
        info!(
            transaction_id = %request.transaction_id,
            amount = %request.amount,
            currency = %request.currency,
            "Requesting Airtel payment"
        );

        let payload = json!({
            "reference": request.truncated_reference(),
            "subscriber": {
                "country": request.subscriber_country.to_uppercase(),
                "currency": request.currency,
                "msisdn": request.msisdn,
            },
            "transaction": {
                "amount": request.amount.to_f64().unwrap_or_default(),
                "country": self.config.country,
                "currency": request.currency,
                "id": request.transaction_id,
            },
        });

        let envelope = self
            .make_request(Method::POST, PAYMENT_PATH, &request.currency, Some(&payload))
            .await?;
        let (transaction, status) = split_envelope(envelope)?;

        let response = PaymentResponse {
            transaction_id: transaction.id,
            status: transaction.status,
            code: status.code,
            result_code: status.result_code,
            response_code: status.response_code,
            success: status.success,
            message: status.message,
        };

        info!(
            transaction_id = %request.transaction_id,
            accepted = response.is_accepted(),
            result_code = ?response.result_code,
            "Airtel payment requested"
        );
        Ok(response)
    }

    async fn transaction_enquiry(
        &self,
        transaction_id: &str,
        currency: &str,
    ) -> AppResult<EnquiryResponse> {
        debug!(transaction_id, "Airtel transaction enquiry");

        let path = format!("{}{}", ENQUIRY_PATH, transaction_id);
        let envelope = self.make_request(Method::GET, &path, currency, None).await?;
        let (transaction, status) = split_envelope(envelope)?;

        Ok(EnquiryResponse {
            transaction_id: transaction.id,
            airtel_money_id: transaction.airtel_money_id,
            status: transaction.status.map(TransactionStatus::from),
            message: transaction.message.or(status.message),
            code: status.code,
            result_code: status.result_code,
            response_code: status.response_code,
            success: status.success,
        })
    }

    async fn refund(&self, airtel_money_id: &str, currency: &str) -> AppResult<RefundResponse> {
        info!(airtel_money_id, "Requesting Airtel refund");

        let payload = json!({ "transaction": { "airtel_money_id": airtel_money_id } });
        let envelope = self
            .make_request(Method::POST, REFUND_PATH, currency, Some(&payload))
            .await?;
        let (transaction, status) = split_envelope(envelope)?;

        Ok(RefundResponse {
            airtel_money_id: transaction.airtel_money_id,
            status: transaction.status,
            code: status.code,
            result_code: status.result_code,
            success: status.success,
        })
    }

    fn validate_webhook_signature(&self, payload: &[u8], signature: Option<&str>) -> bool {
        let key = match &self.config.callback_key {
            Some(key) => key,
            None => return true,
        };
        let signature = match signature {
            Some(signature) => signature.trim(),
            None => return false,
        };

        let mut mac = match Hmac::<Sha256>::new_from_slice(key.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(payload);

        match BASE64.decode(signature) {
            Ok(expected) => mac.verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }
}

fn split_envelope(
    envelope: AirtelEnvelope<AirtelTransaction>,
) -> AppResult<(AirtelTransaction, AirtelStatus)> {
    let status = envelope
        .status
        .ok_or_else(|| AppError::provider("Response without status", false))?;
    let transaction = envelope
        .data
        .and_then(|data| data.transaction)
        .unwrap_or_default();
    Ok((transaction, status))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

impl TokenResponse {
    /// Airtel sends `expires_in` as a string or a number; default to 180s
    fn expires_in_secs(&self) -> u64 {
        match &self.expires_in {
            Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(180),
            Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(180),
            _ => 180,
        }
    }
}
