//! Application configuration loaded from environment variables.

use std::time::Duration;

use crate::errors::{ClientError, Result};
use crate::submit::ConfirmationPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    /// Node (algod) REST endpoint, e.g. https://testnet-api.algonode.cloud
    pub algod_url: String,
    /// API key sent as `X-API-Key` to the node; empty means none
    pub algod_token: String,
    /// Indexer REST endpoint used for transaction history
    pub indexer_url: String,
    pub indexer_token: String,
    /// Static fallback contract id when neither caller nor session selects one
    pub app_id: Option<u64>,
    /// Port for the read API server
    pub api_port: u16,
    /// How many pending-transaction lookups before giving up
    pub confirm_attempts: u32,
    /// Delay between pending-transaction lookups
    pub confirm_interval_ms: u64,
    /// Page size for history queries (1..=1000)
    pub history_page_size: u32,
    /// Per-request timeout applied by the HTTP client
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Config {
            algod_url: env_var("ALGOD_URL").map_err(|_| {
                ClientError::Config("ALGOD_URL environment variable is required".to_string())
            })?,
            algod_token: env_var("ALGOD_TOKEN").unwrap_or_default(),
            indexer_url: env_var("INDEXER_URL")
                .unwrap_or_else(|_| "https://testnet-idx.algonode.cloud".to_string()),
            indexer_token: env_var("INDEXER_TOKEN").unwrap_or_default(),
            app_id: match env_var("APP_ID") {
                Ok(raw) => Some(parse_app_id(&raw)?),
                Err(_) => None,
            },
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .map_err(|_| ClientError::Config("Invalid API_PORT".to_string()))?,
            confirm_attempts: env_var("CONFIRM_ATTEMPTS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .map_err(|_| ClientError::Config("Invalid CONFIRM_ATTEMPTS".to_string()))?,
            confirm_interval_ms: env_var("CONFIRM_INTERVAL_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .map_err(|_| ClientError::Config("Invalid CONFIRM_INTERVAL_MS".to_string()))?,
            history_page_size: env_var("HISTORY_PAGE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| ClientError::Config("Invalid HISTORY_PAGE_SIZE".to_string()))?,
            http_timeout_secs: env_var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ClientError::Config("Invalid HTTP_TIMEOUT_SECS".to_string()))?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.algod_url.trim().is_empty() {
            return Err(ClientError::Config("ALGOD_URL must not be empty".to_string()));
        }
        if self.history_page_size == 0 || self.history_page_size > 1000 {
            return Err(ClientError::Config(
                "HISTORY_PAGE_SIZE must be between 1 and 1000".to_string(),
            ));
        }
        if self.confirm_attempts == 0 {
            return Err(ClientError::Config(
                "CONFIRM_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            max_attempts: self.confirm_attempts,
            interval: Duration::from_millis(self.confirm_interval_ms),
        }
    }
}

/// Parse a positive contract id.
pub fn parse_app_id(raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ClientError::Config(format!(
            "Invalid APP_ID {raw:?}: expected a positive integer"
        ))),
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ClientError::Config(format!("Missing env var: {key}")))
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        algod_url: "http://localhost:4001".to_string(),
        algod_token: String::new(),
        indexer_url: "http://localhost:8980".to_string(),
        indexer_token: String::new(),
        app_id: None,
        api_port: 3001,
        confirm_attempts: 15,
        confirm_interval_ms: 2000,
        history_page_size: 1000,
        http_timeout_secs: 30,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_id_must_be_positive() {
        assert_eq!(parse_app_id(" 42 ").unwrap(), 42);
        assert!(parse_app_id("0").is_err());
        assert!(parse_app_id("-3").is_err());
        assert!(parse_app_id("abc").is_err());
    }

    #[test]
    fn page_size_is_bounded() {
        let mut config = test_config();
        assert!(config.validate().is_ok());
        config.history_page_size = 1001;
        assert!(matches!(config.validate(), Err(ClientError::Config(_))));
        config.history_page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn confirmation_policy_follows_config() {
        let policy = test_config().confirmation_policy();
        assert_eq!(policy.max_attempts, 15);
        assert_eq!(policy.interval, Duration::from_millis(2000));
    }
}
