//! HTTP surface of the gateway

pub mod callback;
pub mod health;
pub mod privacy;
pub mod transactions;

use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use crate::payments::PaymentProvider;
use crate::services::GatewayService;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GatewayService>,
    /// Used to check callback signatures
    pub provider: Arc<dyn PaymentProvider>,
    /// `None` in tests that run without Postgres
    pub db: Option<PgPool>,
    /// Flips to `true` on shutdown so long polls return early
    pub shutdown: watch::Receiver<bool>,
    pub environment: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/callback", post(callback::airtel_callback))
        .route("/transactions/config", get(transactions::client_config))
        .route("/transactions/start", post(transactions::start))
        .route("/transactions/complete", post(transactions::complete))
        .route("/transactions/await", post(transactions::await_settlement))
        .route("/transactions/refund", post(transactions::refund))
        .route(
            "/privacy/users/:user_id",
            get(privacy::export_user).delete(privacy::erase_user),
        )
        .route("/privacy/payments", post(privacy::erase_payments))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::services::testing::Harness;

    pub fn test_state(h: &Harness) -> AppState {
        let (_tx, rx) = watch::channel(false);
        AppState {
            service: h.service.clone(),
            provider: h.provider.clone(),
            db: None,
            shutdown: rx,
            environment: "development".to_string(),
        }
    }
}
