//! Gateway audit log
//!
//! Every outbound Airtel call and every inbound callback produces a
//! [`RequestLog`] event. Events always go to `tracing`; a [`RequestLogSink`]
//! decides where else they are kept.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::logging::redact_sensitive_data;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestLogKind {
    /// Call made to the Airtel API
    Outbound,
    /// Callback received from Airtel
    Callback,
}

impl RequestLogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outbound => "outbound",
            Self::Callback => "callback",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLog {
    pub kind: RequestLogKind,
    pub verb: String,
    /// `<environment>:<path>`, e.g. `sandbox:merchant/v1/payments/`
    pub location: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl RequestLog {
    pub fn outbound(verb: &str, location: String, payload: serde_json::Value) -> Self {
        Self {
            kind: RequestLogKind::Outbound,
            verb: verb.to_string(),
            location,
            payload,
            created_at: Utc::now(),
        }
    }

    pub fn callback(payload: serde_json::Value) -> Self {
        Self {
            kind: RequestLogKind::Callback,
            verb: "POST".to_string(),
            location: "callback".to_string(),
            payload,
            created_at: Utc::now(),
        }
    }

    /// Payload as logged: secrets and tokens replaced by `[REDACTED]`
    pub fn redacted_payload(&self) -> serde_json::Value {
        let text = redact_sensitive_data(&self.payload.to_string());
        serde_json::from_str(&text).unwrap_or(serde_json::Value::Null)
    }
}

#[async_trait]
pub trait RequestLogSink: Send + Sync {
    async fn record(&self, event: RequestLog);
}

/// Sink that only writes the event to the tracing subscriber
#[derive(Debug, Clone, Default)]
pub struct TracingLogSink;

#[async_trait]
impl RequestLogSink for TracingLogSink {
    async fn record(&self, event: RequestLog) {
        emit(&event);
    }
}

pub(crate) fn emit(event: &RequestLog) {
    info!(
        event_type = "request_log",
        kind = event.kind.as_str(),
        verb = %event.verb,
        location = %event.location,
        payload = %event.redacted_payload(),
        "Gateway request logged"
    );
}
