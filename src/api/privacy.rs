//! Personal-data export and erasure for tracking rows

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;
use crate::error::AppError;
use crate::services::host::TrackedTransaction;

#[derive(Debug, Serialize, Deserialize)]
pub struct Erased {
    pub deleted: u64,
}

#[derive(Debug, Deserialize)]
pub struct ErasePayments {
    pub payment_ids: Vec<i64>,
}

pub async fn export_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<TrackedTransaction>>, AppError> {
    Ok(Json(state.service.store().find_by_user_id(user_id).await?))
}

pub async fn erase_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Erased>, AppError> {
    let deleted = state.service.store().delete_by_user_id(user_id).await?;
    info!(user_id, deleted, "Erased tracking rows for user");
    Ok(Json(Erased { deleted }))
}

pub async fn erase_payments(
    State(state): State<AppState>,
    Json(request): Json<ErasePayments>,
) -> Result<Json<Erased>, AppError> {
    if request.payment_ids.is_empty() {
        return Ok(Json(Erased { deleted: 0 }));
    }
    let deleted = state
        .service
        .store()
        .delete_by_payment_ids(&request.payment_ids)
        .await?;
    info!(payments = request.payment_ids.len(), deleted, "Erased tracking rows for payments");
    Ok(Json(Erased { deleted }))
}

#[cfg(test)]
mod tests {
    use crate::api::{router, test_support::test_state};
    use crate::services::host::TransactionStore;
    use crate::services::testing::{harness, tracked};
    use axum::body::{to_bytes, Body};
    use http::{Method, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_export_user() {
        let h = harness();
        tracked(&h, "1111111111").await;
        tracked(&h, "2222222222").await;

        let response = router(test_state(&h))
            .oneshot(
                http::Request::builder()
                    .uri("/privacy/users/2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_erase_user() {
        let h = harness();
        tracked(&h, "1111111111").await;

        let response = router(test_state(&h))
            .oneshot(
                http::Request::builder()
                    .method(Method::DELETE)
                    .uri("/privacy/users/2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(json_body(response).await["deleted"], 1);
        assert!(h.store.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_erase_payments_only_touches_listed_ids() {
        let h = harness();
        tracked(&h, "1111111111").await;
        tracked(&h, "2222222222").await;
        h.store.set_payment_id("1111111111", 10).await.unwrap();
        h.store.set_payment_id("2222222222", 11).await.unwrap();

        let response = router(test_state(&h))
            .oneshot(
                http::Request::builder()
                    .method(Method::POST)
                    .uri("/privacy/payments")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"payment_ids":[10,99]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(json_body(response).await["deleted"], 1);
        assert!(h.store.rows.lock().unwrap().contains_key("2222222222"));
    }
}
