//! Checkout endpoints
//!
//! Thin wrappers around [`GatewayService`](crate::services::GatewayService);
//! every handler answers JSON.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;
use crate::error::AppError;
use crate::services::gateway::{
    ClientConfig, CompletionResult, RefundResult, StartResult, StartTransaction,
};
use crate::services::host::PayableRef;
use crate::services::PollOutcome;

#[derive(Debug, Deserialize)]
pub struct ConfigQuery {
    pub component: String,
    pub payment_area: String,
    pub item_id: i64,
    pub user_id: i64,
}

/// Identifies a started transaction for the payer who started it
#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub component: String,
    pub payment_area: String,
    pub item_id: i64,
    pub transaction_id: String,
    pub user_id: i64,
}

impl TransactionQuery {
    fn payable(&self) -> PayableRef {
        PayableRef {
            component: self.component.clone(),
            payment_area: self.payment_area.clone(),
            item_id: self.item_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub transaction_id: String,
}

#[derive(Debug, Serialize)]
pub struct AwaitResponse {
    pub transaction_id: String,
    #[serde(flatten)]
    pub outcome: PollOutcome,
}

pub async fn client_config(
    State(state): State<AppState>,
    Query(query): Query<ConfigQuery>,
) -> Result<Json<ClientConfig>, AppError> {
    let payable = PayableRef {
        component: query.component,
        payment_area: query.payment_area,
        item_id: query.item_id,
    };
    let config = state
        .service
        .config_for_client(&payable, query.user_id)
        .await?;
    Ok(Json(config))
}

pub async fn start(
    State(state): State<AppState>,
    Json(request): Json<StartTransaction>,
) -> Result<Json<StartResult>, AppError> {
    Ok(Json(state.service.start_transaction(request).await?))
}

pub async fn complete(
    State(state): State<AppState>,
    Json(query): Json<TransactionQuery>,
) -> Result<Json<CompletionResult>, AppError> {
    let result = state
        .service
        .complete_transaction(&query.payable(), &query.transaction_id, query.user_id)
        .await?;
    Ok(Json(result))
}

/// Long poll until the transaction settles or the poll budget runs out
pub async fn await_settlement(
    State(state): State<AppState>,
    Json(query): Json<TransactionQuery>,
) -> Result<Json<AwaitResponse>, AppError> {
    let outcome = state
        .service
        .await_transaction(
            &query.payable(),
            &query.transaction_id,
            query.user_id,
            state.shutdown.clone(),
        )
        .await;

    info!(transaction_id = %query.transaction_id, outcome = ?outcome, "Transaction poll finished");
    Ok(Json(AwaitResponse {
        transaction_id: query.transaction_id,
        outcome,
    }))
}

pub async fn refund(
    State(state): State<AppState>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<RefundResult>, AppError> {
    Ok(Json(state.service.refund(&request.transaction_id).await?))
}

#[cfg(test)]
mod tests {
    use crate::api::{router, test_support::test_state};
    use crate::services::testing::{harness, tracked};
    use axum::body::{to_bytes, Body};
    use http::{Method, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn post(uri: &str, body: Value) -> http::Request<Body> {
        http::Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn transaction(id: &str) -> Value {
        json!({
            "component": "enrol_fee",
            "payment_area": "fee",
            "item_id": 5,
            "transaction_id": id,
            "user_id": 2
        })
    }

    #[tokio::test]
    async fn test_client_config() {
        let h = harness();
        let response = router(test_state(&h))
            .oneshot(
                http::Request::builder()
                    .uri("/transactions/config?component=enrol_fee&payment_area=fee&item_id=5&user_id=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["cost"], json!(1030.0));
        assert_eq!(body["currency"], "UGX");
        assert_eq!(body["reference"], "enrol_fee fee 5 2");
    }

    #[tokio::test]
    async fn test_client_config_unknown_payable() {
        let h = harness();
        let response = router(test_state(&h))
            .oneshot(
                http::Request::builder()
                    .uri("/transactions/config?component=enrol_fee&payment_area=fee&item_id=404&user_id=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["code"], "PAYABLE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_start_transaction() {
        let h = harness();
        h.provider.accept_payment("1234567890");

        let response = router(test_state(&h))
            .oneshot(post(
                "/transactions/start",
                json!({
                    "component": "enrol_fee",
                    "payment_area": "fee",
                    "item_id": 5,
                    "user_id": 2,
                    "reference": "enrol_fee fee 5 2",
                    "phone": "772123456",
                    "country": "UG"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["transaction_id"], "1234567890");
        assert!(h.store.rows.lock().unwrap().contains_key("1234567890"));
    }

    #[tokio::test]
    async fn test_start_with_bad_phone_is_rejected() {
        let h = harness();
        let response = router(test_state(&h))
            .oneshot(post(
                "/transactions/start",
                json!({
                    "component": "enrol_fee",
                    "payment_area": "fee",
                    "item_id": 5,
                    "user_id": 2,
                    "reference": "r",
                    "phone": "12",
                    "country": "UG"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(h.provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complete_reports_status() {
        let h = harness();
        tracked(&h, "1234567890").await;
        h.provider.push_enquiry("TS");

        let response = router(test_state(&h))
            .oneshot(post("/transactions/complete", transaction("1234567890")))
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["status"], "TS");
        assert_eq!(h.ledger.deliveries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_complete_unknown_transaction_fails() {
        let h = harness();
        let response = router(test_state(&h))
            .oneshot(post("/transactions/complete", transaction("42")))
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["status"], "TF");
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_settlement() {
        let h = harness();
        tracked(&h, "1234567890").await;
        h.provider.push_enquiry("TIP");
        h.provider.push_enquiry("TS");

        let response = router(test_state(&h))
            .oneshot(post("/transactions/await", transaction("1234567890")))
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["outcome"], "succeeded");
        assert_eq!(body["step"], 2);
        assert_eq!(body["transaction_id"], "1234567890");
    }

    #[tokio::test]
    async fn test_refund_requires_completed_transaction() {
        let h = harness();
        tracked(&h, "1234567890").await;

        let response = router(test_state(&h))
            .oneshot(post(
                "/transactions/refund",
                json!({ "transaction_id": "1234567890" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(h.provider.refunds.lock().unwrap().is_empty());
    }
}
