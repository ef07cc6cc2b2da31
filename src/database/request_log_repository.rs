//! Persistent audit log of Airtel traffic (`request_logs`)

use crate::database::error::DatabaseError;
use crate::events::{self, RequestLog, RequestLogSink};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct RequestLogEntry {
    pub id: Uuid,
    pub kind: String,
    pub verb: String,
    pub location: String,
    pub payload: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub struct RequestLogRepository {
    pool: PgPool,
}

impl RequestLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store an event; the payload is redacted before it is written
    pub async fn log_event(&self, event: &RequestLog) -> Result<RequestLogEntry, DatabaseError> {
        sqlx::query_as::<_, RequestLogEntry>(
            "INSERT INTO request_logs (id, kind, verb, location, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, kind, verb, location, payload, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(event.kind.as_str())
        .bind(&event.verb)
        .bind(&event.location)
        .bind(event.redacted_payload())
        .bind(event.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[async_trait]
impl RequestLogSink for RequestLogRepository {
    async fn record(&self, event: RequestLog) {
        events::emit(&event);
        // Losing an audit row must not fail the payment flow.
        if let Err(e) = self.log_event(&event).await {
            warn!(error = %e, location = %event.location, "Failed to persist request log");
        }
    }
}
