//! Collaborators owned by the hosting checkout platform
//!
//! The gateway never touches accounts, ledgers or enrolments directly. It goes
//! through these traits; `database` provides Postgres implementations.

use crate::error::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Gateway name recorded with every saved payment
pub const GATEWAY_NAME: &str = "airtelafrica";

/// Something that can be paid for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payable {
    pub account_id: i64,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub phone1: Option<String>,
    pub phone2: Option<String>,
    pub country: Option<String>,
}

impl User {
    /// Phone number to push the payment to
    ///
    /// `phone2` wins over `phone1`. Non-digits are stripped and anything of five
    /// digits or fewer is not a usable number.
    pub fn payment_phone(&self) -> Option<String> {
        let raw = match self.phone2.as_deref() {
            Some(phone) if !phone.trim().is_empty() => phone,
            _ => self.phone1.as_deref().unwrap_or_default(),
        };
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        (digits.len() > 5).then_some(digits)
    }

    pub fn country_code(&self) -> Option<String> {
        self.country
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase)
    }
}

/// Identifies the item being paid for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayableRef {
    pub component: String,
    pub payment_area: String,
    pub item_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub account_id: i64,
    pub component: String,
    pub payment_area: String,
    pub item_id: i64,
    pub user_id: i64,
    pub amount: Decimal,
    pub currency: String,
    pub gateway: String,
}

/// Row of `airtel_transactions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct TrackedTransaction {
    pub id: Uuid,
    pub transaction_id: String,
    pub money_id: Option<String>,
    pub payment_id: Option<i64>,
    pub item_id: i64,
    pub component: String,
    pub payment_area: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set once the paid item has been handed to the user
    pub delivered_at: Option<DateTime<Utc>>,
}

impl TrackedTransaction {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn is_delivered(&self) -> bool {
        self.delivered_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewTrackedTransaction {
    pub transaction_id: String,
    pub item_id: i64,
    pub component: String,
    pub payment_area: String,
    pub user_id: i64,
}

#[async_trait]
pub trait PaymentLedger: Send + Sync {
    async fn get_payable(&self, payable: &PayableRef) -> AppResult<Payable>;

    /// Record a received payment, returning its id
    async fn save_payment(&self, payment: &NewPayment) -> AppResult<i64>;

    /// Hand the paid item to the user (enrolment, etc.)
    async fn deliver_order(
        &self,
        payable: &PayableRef,
        payment_id: i64,
        user_id: i64,
    ) -> AppResult<()>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, user_id: i64) -> AppResult<Option<User>>;
}

/// Storage for tracking rows
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, transaction: NewTrackedTransaction) -> AppResult<TrackedTransaction>;

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> AppResult<Option<TrackedTransaction>>;

    /// Set `completed_at` and `money_id` if the row is still open
    ///
    /// Returns `false` when another caller completed it first.
    async fn mark_completed(&self, transaction_id: &str, money_id: Option<&str>)
        -> AppResult<bool>;

    async fn set_payment_id(&self, transaction_id: &str, payment_id: i64) -> AppResult<()>;

    async fn mark_delivered(&self, transaction_id: &str) -> AppResult<()>;

    /// Undo `mark_completed` after a failed ledger write
    async fn reopen(&self, transaction_id: &str) -> AppResult<()>;

    async fn delete_incomplete_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;

    async fn find_by_user_id(&self, user_id: i64) -> AppResult<Vec<TrackedTransaction>>;

    async fn delete_by_user_id(&self, user_id: i64) -> AppResult<u64>;

    async fn delete_by_payment_ids(&self, payment_ids: &[i64]) -> AppResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(phone1: Option<&str>, phone2: Option<&str>) -> User {
        User {
            id: 1,
            phone1: phone1.map(String::from),
            phone2: phone2.map(String::from),
            country: Some("ug".to_string()),
        }
    }

    #[test]
    fn test_payment_phone_prefers_phone2() {
        let u = user(Some("0700 000 001"), Some("+256 772-123-456"));
        assert_eq!(u.payment_phone().as_deref(), Some("256772123456"));
    }

    #[test]
    fn test_payment_phone_falls_back_to_phone1() {
        let u = user(Some("(0772) 123 456"), Some(" "));
        assert_eq!(u.payment_phone().as_deref(), Some("0772123456"));
    }

    #[test]
    fn test_short_phone_is_rejected() {
        assert_eq!(user(Some("12-345"), None).payment_phone(), None);
        assert_eq!(user(None, None).payment_phone(), None);
    }

    #[test]
    fn test_country_code_is_uppercased() {
        assert_eq!(user(None, None).country_code().as_deref(), Some("UG"));
    }
}
