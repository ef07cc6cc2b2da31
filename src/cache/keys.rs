//! Cache key layout
//!
//! Keys are namespaced by service and versioned so a format change never reads stale data.

const PREFIX: &str = "airtel:v1";

/// Bearer token for one client id in one Airtel environment
pub fn access_token(environment: &str, client_id: &str) -> String {
    format!("{}:token:{}:{}", PREFIX, environment, client_id)
}
