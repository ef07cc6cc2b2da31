use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::payments::types::AirtelEnvironment;

/// Countries where Airtel Africa collections are available
pub const SUPPORTED_COUNTRIES: [&str; 16] = [
    "CD", "CG", "GA", "GH", "KE", "LR", "MG", "MW", "NE", "NG", "RW", "SC", "TD", "TZ", "UG", "ZA",
];

/// Currencies accepted by the gateway
pub const SUPPORTED_CURRENCIES: [&str; 13] = [
    "UGX", "NGN", "TZS", "KES", "RWF", "XOF", "XAF", "CDF", "USD", "SCR", "MGA", "MWK", "ZMW",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub airtel: AirtelConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Create the gateway tables on startup
    pub apply_schema: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AirtelConfig {
    pub environment: AirtelEnvironment,
    pub client_id: String,
    pub secret: String,
    pub client_id_sandbox: String,
    pub secret_sandbox: String,
    /// Merchant country, sent as `X-Country`
    pub country: String,
    pub timeout_secs: u64,
    /// Key used by Airtel to sign callbacks, if callback authentication is enabled
    pub callback_key: Option<String>,
    /// Overrides the environment base URL (tests, proxies)
    pub base_url: Option<String>,
}

impl AirtelConfig {
    /// Client id for the selected environment
    pub fn active_client_id(&self) -> &str {
        match self.environment {
            AirtelEnvironment::Sandbox => &self.client_id_sandbox,
            AirtelEnvironment::Live => &self.client_id,
        }
    }

    /// Client secret for the selected environment
    pub fn active_secret(&self) -> &str {
        match self.environment {
            AirtelEnvironment::Sandbox => &self.secret_sandbox,
            AirtelEnvironment::Live => &self.secret,
        }
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.environment.base_url().to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Surcharge in percent added on top of the payable amount
    pub surcharge: u32,
    pub poll_steps: u32,
    pub poll_interval_ms: u64,
    pub cleanup_interval_secs: u64,
    pub cleanup_max_age_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            surcharge: 0,
            poll_steps: 10,
            poll_interval_ms: 18_000,
            cleanup_interval_secs: 3600,
            cleanup_max_age_secs: 86_400,
        }
    }
}

impl GatewayConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn cleanup_max_age(&self) -> Duration {
        Duration::from_secs(self.cleanup_max_age_secs)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| anyhow!("{} must be a valid number, got {}", key, value)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .context("PORT not set")?
                .parse()
                .context("PORT must be a valid number")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        };

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL").context("DATABASE_URL not set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid number")?,
            apply_schema: env::var("DATABASE_APPLY_SCHEMA")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };

        let redis = env::var("REDIS_URL").ok().map(|url| RedisConfig { url });

        let environment: AirtelEnvironment = env::var("AIRTEL_ENVIRONMENT")
            .unwrap_or_else(|_| "sandbox".to_string())
            .parse()
            .map_err(|e: String| anyhow!(e))?;

        let airtel = AirtelConfig {
            environment,
            client_id: env::var("AIRTEL_CLIENT_ID").unwrap_or_default(),
            secret: env::var("AIRTEL_SECRET").unwrap_or_default(),
            client_id_sandbox: env::var("AIRTEL_CLIENT_ID_SANDBOX").unwrap_or_default(),
            secret_sandbox: env::var("AIRTEL_SECRET_SANDBOX").unwrap_or_default(),
            country: env::var("AIRTEL_COUNTRY")
                .unwrap_or_else(|_| "UG".to_string())
                .to_uppercase(),
            timeout_secs: parse_or("AIRTEL_TIMEOUT_SECS", 30)?,
            callback_key: env::var("AIRTEL_CALLBACK_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: env::var("AIRTEL_BASE_URL").ok(),
        };

        let defaults = GatewayConfig::default();
        let gateway = GatewayConfig {
            surcharge: parse_or("GATEWAY_SURCHARGE", defaults.surcharge)?,
            poll_steps: parse_or("POLL_STEPS", defaults.poll_steps)?,
            poll_interval_ms: parse_or("POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
            cleanup_interval_secs: parse_or("CLEANUP_INTERVAL_SECS", defaults.cleanup_interval_secs)?,
            cleanup_max_age_secs: parse_or("CLEANUP_MAX_AGE_SECS", defaults.cleanup_max_age_secs)?,
        };

        let config = Config {
            server,
            database,
            redis,
            airtel,
            gateway,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.database.url.trim().is_empty() {
            return Err(anyhow!("DATABASE_URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be greater than 0"));
        }

        if let Some(redis) = &self.redis {
            if redis.url.trim().is_empty() {
                return Err(anyhow!("REDIS_URL cannot be empty"));
            }
        }

        if !SUPPORTED_COUNTRIES.contains(&self.airtel.country.as_str()) {
            return Err(anyhow!(
                "AIRTEL_COUNTRY must be one of: {:?}, got {}",
                SUPPORTED_COUNTRIES,
                self.airtel.country
            ));
        }

        if self.airtel.active_client_id().trim().is_empty()
            || self.airtel.active_secret().trim().is_empty()
        {
            return Err(anyhow!(
                "Airtel credentials for the {} environment are missing",
                self.airtel.environment
            ));
        }

        if self.gateway.poll_steps == 0 {
            return Err(anyhow!("POLL_STEPS must be greater than 0"));
        }

        if self.gateway.surcharge > 100 {
            return Err(anyhow!(
                "GATEWAY_SURCHARGE must be a percentage, got {}",
                self.gateway.surcharge
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                environment: "development".to_string(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/airtel".to_string(),
                max_connections: 5,
                apply_schema: false,
            },
            redis: None,
            airtel: AirtelConfig {
                environment: AirtelEnvironment::Sandbox,
                client_id: String::new(),
                secret: String::new(),
                client_id_sandbox: "sandbox-id".to_string(),
                secret_sandbox: "sandbox-secret".to_string(),
                country: "UG".to_string(),
                timeout_secs: 30,
                callback_key: None,
                base_url: None,
            },
            gateway: GatewayConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_credentials_follow_environment() {
        let mut config = valid_config();
        assert_eq!(config.airtel.active_client_id(), "sandbox-id");

        config.airtel.environment = AirtelEnvironment::Live;
        assert!(config.validate().is_err());

        config.airtel.client_id = "live-id".to_string();
        config.airtel.secret = "live-secret".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.airtel.active_secret(), "live-secret");
    }

    #[test]
    fn test_unsupported_country_rejected() {
        let mut config = valid_config();
        config.airtel.country = "BE".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_poll_steps_rejected() {
        let mut config = valid_config();
        config.gateway.poll_steps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_url_override() {
        let mut config = valid_config();
        assert_eq!(config.airtel.base_url(), "https://openapiuat.airtel.africa/");
        config.airtel.base_url = Some("http://127.0.0.1:9000/".to_string());
        assert_eq!(config.airtel.base_url(), "http://127.0.0.1:9000/");
    }
}
