//! Payment provider trait definitions
//!
//! Defines the interface the gateway uses to talk to a mobile-money provider.

use crate::error::AppResult;
use crate::payments::types::{EnquiryResponse, PaymentRequest, PaymentResponse, RefundResponse};
use async_trait::async_trait;

/// Trait for mobile-money provider implementations
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Push a payment prompt (USSD push) to the subscriber's phone
    ///
    /// # Arguments
    /// * `request` - Transaction id, reference, amount, currency and subscriber details
    ///
    /// # Returns
    /// * `PaymentResponse` - Whether Airtel accepted the request, with its result codes
    async fn request_payment(&self, request: PaymentRequest) -> AppResult<PaymentResponse>;

    /// Ask the provider whether a previously started transaction has completed
    ///
    /// # Arguments
    /// * `transaction_id` - Our transaction id sent with `request_payment`
    /// * `currency` - Currency of the payment, sent as `X-Currency`
    async fn transaction_enquiry(
        &self,
        transaction_id: &str,
        currency: &str,
    ) -> AppResult<EnquiryResponse>;

    /// Refund a completed transaction
    ///
    /// # Arguments
    /// * `airtel_money_id` - Provider reference of the completed transaction
    /// * `currency` - Currency of the payment
    async fn refund(&self, airtel_money_id: &str, currency: &str) -> AppResult<RefundResponse>;

    /// Verify that a callback body was signed by the provider
    fn validate_webhook_signature(&self, payload: &[u8], signature: Option<&str>) -> bool;
}
