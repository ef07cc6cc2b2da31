use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::database;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub airtel_environment: String,
    pub merchant_country: String,
    pub database: String,
}

pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let database = match &state.db {
        Some(pool) => match database::health_check(pool).await {
            Ok(()) => "up",
            Err(_) => "down",
        },
        None => "disabled",
    };

    let status = if database == "down" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let response = HealthResponse {
        status: if status.is_success() { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.environment.clone(),
        airtel_environment: state.service.settings().environment.to_string(),
        merchant_country: state.service.settings().merchant_country.clone(),
        database: database.to_string(),
    };

    (status, Json(response))
}
