//! Airtel callback endpoint
//!
//! Airtel posts `{"transaction": {...}, "hash": "..."}` when a payment settles.
//! The answer is always an empty body; only a bad signature or unreadable JSON
//! is rejected.

use axum::{body::Bytes, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::value::RawValue;
use tracing::{error, info, warn};

use super::AppState;
use crate::payments::types::{CallbackPayload, CallbackTransaction};

#[derive(Deserialize)]
struct SignedCallback<'a> {
    #[serde(borrow, default)]
    transaction: Option<&'a RawValue>,
    #[serde(default)]
    hash: Option<String>,
}

pub async fn airtel_callback(
    State(state): State<AppState>,
    body: Bytes,
) -> StatusCode {
    let signed: SignedCallback<'_> = match serde_json::from_slice(&body) {
        Ok(signed) => signed,
        Err(e) => {
            warn!(error = %e, "Callback body is not JSON");
            return StatusCode::BAD_REQUEST;
        }
    };

    let raw = match signed.transaction {
        Some(raw) => raw,
        None => {
            info!("Callback without transaction ignored");
            return StatusCode::OK;
        }
    };

    // The hash covers the `transaction` object exactly as Airtel serialized it.
    if !state
        .provider
        .validate_webhook_signature(raw.get().as_bytes(), signed.hash.as_deref())
    {
        warn!("Callback signature rejected");
        return StatusCode::UNAUTHORIZED;
    }

    let transaction: CallbackTransaction = match serde_json::from_str(raw.get()) {
        Ok(transaction) => transaction,
        Err(e) => {
            warn!(error = %e, "Callback transaction without id or status_code ignored");
            return StatusCode::OK;
        }
    };

    let payload = CallbackPayload {
        transaction,
        hash: signed.hash,
    };
    if let Err(e) = state.service.handle_callback(payload).await {
        error!(error = %e, "Callback processing failed");
    }

    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use crate::api::{router, test_support::test_state};
    use crate::services::testing::{harness, tracked};
    use axum::body::{to_bytes, Body};
    use http::{Method, StatusCode};
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    fn post(body: &str) -> http::Request<Body> {
        http::Request::builder()
            .method(Method::POST)
            .uri("/callback")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_successful_callback_completes_transaction() {
        let h = harness();
        tracked(&h, "1234567890").await;
        h.provider.push_enquiry("TS");

        let response = router(test_state(&h))
            .oneshot(post(
                r#"{"transaction":{"id":"1234567890","message":"Paid","status_code":"TS","airtel_money_id":"MP1"}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
        assert_eq!(h.ledger.payments.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_is_not_allowed() {
        let h = harness();
        let response = router(test_state(&h))
            .oneshot(
                http::Request::builder()
                    .uri("/callback")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_bad_signature_is_rejected() {
        let h = harness();
        h.provider.reject_signatures.store(true, Ordering::SeqCst);

        let response = router(test_state(&h))
            .oneshot(post(
                r#"{"transaction":{"id":"1","status_code":"TS"},"hash":"bm9wZQ=="}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(h.sink.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_callback_without_status_is_ignored() {
        let h = harness();
        let response = router(test_state(&h))
            .oneshot(post(r#"{"transaction":{"id":"1"}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(h.sink.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let h = harness();
        let response = router(test_state(&h))
            .oneshot(post("not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
