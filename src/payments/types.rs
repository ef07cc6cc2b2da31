//! Airtel Africa request/response types
//!
//! Airtel wraps every answer in the same envelope:
//! `{ "data": { "transaction": {..} }, "status": { "code", "message", "result_code", "response_code", "success" } }`.
//! The `code` field arrives as a string or a number depending on the endpoint.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length Airtel accepts for a payment reference
pub const MAX_REFERENCE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AirtelEnvironment {
    Live,
    Sandbox,
}

impl AirtelEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Live => "https://openapi.airtel.africa/",
            Self::Sandbox => "https://openapiuat.airtel.africa/",
        }
    }

    /// Prefix used for request-log locations
    pub fn label(&self) -> &'static str {
        match self {
            Self::Live => "production",
            Self::Sandbox => "sandbox",
        }
    }
}

impl fmt::Display for AirtelEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Sandbox => write!(f, "sandbox"),
        }
    }
}

impl FromStr for AirtelEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" | "production" => Ok(Self::Live),
            "sandbox" => Ok(Self::Sandbox),
            other => Err(format!(
                "AIRTEL_ENVIRONMENT must be 'live' or 'sandbox', got {}",
                other
            )),
        }
    }
}

/// Transaction status as reported by the enquiry endpoint and callbacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionStatus {
    /// `TS`
    Success,
    /// `TF`
    Failed,
    /// `TA`
    Ambiguous,
    /// `TIP`
    InProgress,
    Unknown(String),
}

impl TransactionStatus {
    pub fn code(&self) -> &str {
        match self {
            Self::Success => "TS",
            Self::Failed => "TF",
            Self::Ambiguous => "TA",
            Self::InProgress => "TIP",
            Self::Unknown(code) => code,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl From<&str> for TransactionStatus {
    fn from(code: &str) -> Self {
        match code.trim().to_uppercase().as_str() {
            "TS" => Self::Success,
            "TF" => Self::Failed,
            "TA" => Self::Ambiguous,
            "TIP" => Self::InProgress,
            _ => Self::Unknown(code.to_string()),
        }
    }
}

impl From<String> for TransactionStatus {
    fn from(code: String) -> Self {
        Self::from(code.as_str())
    }
}

impl From<TransactionStatus> for String {
    fn from(status: TransactionStatus) -> Self {
        status.code().to_string()
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// USSD push payment request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Our transaction id, unique per attempt
    pub transaction_id: String,
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    /// Subscriber phone number without country code
    pub msisdn: String,
    pub subscriber_country: String,
}

impl PaymentRequest {
    pub fn truncated_reference(&self) -> String {
        self.reference.chars().take(MAX_REFERENCE_LEN).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentResponse {
    pub transaction_id: Option<String>,
    pub status: Option<String>,
    pub code: String,
    pub result_code: Option<String>,
    pub response_code: Option<String>,
    pub success: bool,
    pub message: Option<String>,
}

impl PaymentResponse {
    /// Airtel accepted the push request
    pub fn is_accepted(&self) -> bool {
        self.code == "200" && self.success
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnquiryResponse {
    pub transaction_id: Option<String>,
    pub airtel_money_id: Option<String>,
    /// `None` when Airtel answered without a transaction object
    pub status: Option<TransactionStatus>,
    pub message: Option<String>,
    pub code: String,
    pub result_code: Option<String>,
    pub response_code: Option<String>,
    pub success: bool,
}

impl EnquiryResponse {
    /// Status of a successful enquiry, `None` when the enquiry itself failed
    pub fn settled_status(&self) -> Option<&TransactionStatus> {
        if self.code == "200" && self.success {
            self.status.as_ref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundResponse {
    pub airtel_money_id: Option<String>,
    pub status: Option<String>,
    pub code: String,
    pub result_code: Option<String>,
    pub success: bool,
}

/// Body Airtel posts to the callback endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub transaction: CallbackTransaction,
    /// Present when callback authentication is enabled on the Airtel account
    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackTransaction {
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
    pub status_code: String,
    #[serde(default)]
    pub airtel_money_id: Option<String>,
}

// ============================================================================
// Wire envelope
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct AirtelEnvelope<T> {
    #[serde(default)]
    pub data: Option<AirtelData<T>>,
    pub status: Option<AirtelStatus>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AirtelData<T> {
    pub transaction: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AirtelStatus {
    #[serde(deserialize_with = "string_or_number")]
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result_code: Option<String>,
    #[serde(default)]
    pub response_code: Option<String>,
    #[serde(default, deserialize_with = "bool_or_number")]
    pub success: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AirtelTransaction {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub airtel_money_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            Self::String(s) => s,
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(StringOrNumber::into_string)
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StringOrNumber>::deserialize(deserializer).map(|v| v.map(StringOrNumber::into_string))
}

fn bool_or_number<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Bool(b) => b,
        StringOrNumber::Number(n) => n.as_i64() == Some(1),
        StringOrNumber::String(s) => matches!(s.to_lowercase().as_str(), "true" | "1"),
    })
}
