//! Application error types
//!
//! Errors are grouped by where they come from: domain rules, external services
//! (Airtel Africa) and infrastructure (database, cache, configuration).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[cfg(feature = "database")]
use crate::database::error::DatabaseError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Transaction {transaction_id} not found")]
    TransactionNotFound { transaction_id: String },

    #[error("Transaction {transaction_id} was already completed")]
    AlreadyCompleted { transaction_id: String },

    #[error("Nothing payable for {component}/{payment_area}/{item_id}")]
    PayableNotFound {
        component: String,
        payment_area: String,
        item_id: i64,
    },

    #[error("User {user_id} not found")]
    UserNotFound { user_id: i64 },

    #[error("Invalid input for {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("Unsupported currency {currency}")]
    UnsupportedCurrency { currency: String },
}

#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("{provider} error: {message}")]
    PaymentProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },

    #[error("{service} rate limit exceeded")]
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },

    #[error("{service} did not answer within {seconds} seconds")]
    Timeout { service: String, seconds: u64 },

    #[error("Webhook signature from {provider} is invalid")]
    InvalidSignature { provider: String },
}

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[cfg(feature = "database")]
    #[error("{0}")]
    Database(DatabaseError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },
}

#[derive(Debug)]
pub enum AppErrorKind {
    Domain(DomainError),
    External(ExternalError),
    Infrastructure(InfrastructureError),
}

#[derive(Debug)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub context: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn provider(message: impl Into<String>, is_retryable: bool) -> Self {
        Self::new(AppErrorKind::External(ExternalError::PaymentProvider {
            provider: "Airtel Africa".to_string(),
            message: message.into(),
            is_retryable,
        }))
    }

    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }))
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: message.into(),
            },
        ))
    }

    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::External(ExternalError::PaymentProvider { is_retryable, .. }) => {
                *is_retryable
            }
            AppErrorKind::External(ExternalError::RateLimit { .. })
            | AppErrorKind::External(ExternalError::Timeout { .. }) => true,
            #[cfg(feature = "database")]
            AppErrorKind::Infrastructure(InfrastructureError::Database(e)) => e.is_retryable(),
            _ => false,
        }
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match &self.kind {
            AppErrorKind::Domain(DomainError::TransactionNotFound { .. }) => "TRANSACTION_NOT_FOUND",
            AppErrorKind::Domain(DomainError::AlreadyCompleted { .. }) => "ALREADY_COMPLETED",
            AppErrorKind::Domain(DomainError::PayableNotFound { .. }) => "PAYABLE_NOT_FOUND",
            AppErrorKind::Domain(DomainError::UserNotFound { .. }) => "USER_NOT_FOUND",
            AppErrorKind::Domain(DomainError::InvalidInput { .. }) => "INVALID_INPUT",
            AppErrorKind::Domain(DomainError::UnsupportedCurrency { .. }) => "UNSUPPORTED_CURRENCY",
            AppErrorKind::External(ExternalError::PaymentProvider { .. }) => "PROVIDER_ERROR",
            AppErrorKind::External(ExternalError::RateLimit { .. }) => "RATE_LIMITED",
            AppErrorKind::External(ExternalError::Timeout { .. }) => "PROVIDER_TIMEOUT",
            AppErrorKind::External(ExternalError::InvalidSignature { .. }) => "INVALID_SIGNATURE",
            AppErrorKind::Infrastructure(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match &self.kind {
            AppErrorKind::Domain(DomainError::TransactionNotFound { .. })
            | AppErrorKind::Domain(DomainError::PayableNotFound { .. })
            | AppErrorKind::Domain(DomainError::UserNotFound { .. }) => StatusCode::NOT_FOUND,
            AppErrorKind::Domain(DomainError::AlreadyCompleted { .. }) => StatusCode::CONFLICT,
            AppErrorKind::Domain(_) => StatusCode::BAD_REQUEST,
            AppErrorKind::External(ExternalError::InvalidSignature { .. }) => {
                StatusCode::UNAUTHORIZED
            }
            AppErrorKind::External(ExternalError::RateLimit { .. }) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppErrorKind::External(ExternalError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            AppErrorKind::External(_) => StatusCode::BAD_GATEWAY,
            AppErrorKind::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match &self.kind {
            AppErrorKind::Domain(e) => e.to_string(),
            AppErrorKind::External(e) => e.to_string(),
            AppErrorKind::Infrastructure(e) => e.to_string(),
        };

        match &self.context {
            Some(context) => write!(f, "{} ({})", message, context),
            None => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for AppError {}

impl From<DomainError> for AppError {
    fn from(error: DomainError) -> Self {
        Self::new(AppErrorKind::Domain(error))
    }
}

impl From<ExternalError> for AppError {
    fn from(error: ExternalError) -> Self {
        Self::new(AppErrorKind::External(error))
    }
}

#[cfg(feature = "database")]
impl From<DatabaseError> for AppError {
    fn from(error: DatabaseError) -> Self {
        Self::new(AppErrorKind::Infrastructure(InfrastructureError::Database(
            error,
        )))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::new(AppErrorKind::External(ExternalError::Timeout {
                service: "Airtel Africa".to_string(),
                seconds: 0,
            }))
            .with_context(error.to_string());
        }
        Self::provider(error.to_string(), error.is_connect())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        } else {
            tracing::warn!(error = %self, code = self.code(), "request rejected");
        }

        // Infrastructure details stay in the logs.
        let error = match &self.kind {
            AppErrorKind::Infrastructure(_) => "An internal error has occurred.".to_string(),
            _ => self.to_string(),
        };

        (
            status,
            Json(ErrorBody {
                error,
                code: self.code(),
            }),
        )
            .into_response()
    }
}
