//! Logging and tracing configuration
//!
//! Structured JSON logs in production, human-readable output in development.
//! Also holds the helpers that keep phone numbers, tokens and secrets out of logs.

use regex::Regex;
use std::env;
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Environment types for logging configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Detect environment from ENV variable
    pub fn from_env() -> Self {
        Self::parse(
            &env::var("ENVIRONMENT")
                .or_else(|_| env::var("ENV"))
                .unwrap_or_else(|_| "development".to_string()),
        )
    }

    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "staging" | "stage" => Self::Staging,
            _ => Self::Development,
        }
    }

    pub fn default_log_level(&self) -> Level {
        match self {
            Self::Development => Level::DEBUG,
            Self::Staging => Level::INFO,
            Self::Production => Level::INFO,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Initialize the tracing subscriber
///
/// # Environment Variables
/// - `ENVIRONMENT` or `ENV`: "production", "staging" or "development"
/// - `RUST_LOG`: overrides the filter (e.g. "info", "airtel_gateway=debug")
/// - `LOG_FORMAT`: force "json" or "pretty"
pub fn init_tracing() {
    let environment = Environment::from_env();

    let use_json = env::var("LOG_FORMAT")
        .map(|f| f.to_lowercase() == "json")
        .unwrap_or_else(|_| environment.is_production());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{}={},tower_http=debug,axum=info,sqlx=warn,hyper=warn,reqwest=warn",
            env!("CARGO_PKG_NAME").replace('-', "_"),
            environment.default_log_level()
        ))
    });

    if use_json {
        let json_layer = fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_level(true)
            .with_filter(env_filter);

        tracing_subscriber::registry().with(json_layer).init();
    } else {
        let pretty_layer = fmt::layer()
            .pretty()
            .with_target(true)
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter);

        tracing_subscriber::registry().with(pretty_layer).init();
    }

    tracing::info!(
        environment = ?environment,
        format = if use_json { "json" } else { "pretty" },
        "Tracing initialized"
    );
}

/// Mask a phone number for logging, keeping the last 3 digits
///
/// ```
/// use airtel_gateway::logging::mask_msisdn;
/// assert_eq!(mask_msisdn("772123456"), "******456");
/// ```
pub fn mask_msisdn(msisdn: &str) -> String {
    let len = msisdn.chars().count();
    if len <= 4 {
        return "****".to_string();
    }
    let visible: String = msisdn.chars().skip(len - 3).collect();
    format!("{}{}", "*".repeat(len - 3), visible)
}

const SENSITIVE_KEYS: [&str; 10] = [
    "access_token",
    "client_secret",
    "secret",
    "password",
    "token",
    "authorization",
    "Authorization",
    "pin",
    "hash",
    "msisdn",
];

fn sensitive_patterns() -> &'static Vec<(Regex, String)> {
    static PATTERNS: OnceLock<Vec<(Regex, String)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        SENSITIVE_KEYS
            .iter()
            .filter_map(|key| {
                Regex::new(&format!(r#""{}":\s*"[^"]*""#, regex::escape(key)))
                    .ok()
                    .map(|re| (re, format!(r#""{}": "[REDACTED]""#, key)))
            })
            .collect()
    })
}

/// Redact sensitive fields from JSON text
pub fn redact_sensitive_data(text: &str) -> String {
    let mut result = text.to_string();
    for (re, replacement) in sensitive_patterns() {
        result = re.replace_all(&result, replacement.as_str()).to_string();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse("stage"), Environment::Staging);
        assert_eq!(Environment::parse("anything"), Environment::Development);
        assert!(Environment::Production.is_production());
    }

    #[test]
    fn test_default_log_levels() {
        assert_eq!(Environment::Development.default_log_level(), Level::DEBUG);
        assert_eq!(Environment::Production.default_log_level(), Level::INFO);
    }

    #[test]
    fn test_mask_msisdn() {
        assert_eq!(mask_msisdn("772123456"), "******456");
        assert_eq!(mask_msisdn("123"), "****");
    }

    #[test]
    fn test_redact_sensitive_data() {
        let data = r#"{"client_id":"abc","client_secret":"SECRET123","amount":1000}"#;
        let redacted = redact_sensitive_data(data);
        assert!(redacted.contains("[REDACTED]"));
        assert!(!redacted.contains("SECRET123"));
        assert!(redacted.contains("1000"));
        assert!(redacted.contains("abc"));
    }
}
