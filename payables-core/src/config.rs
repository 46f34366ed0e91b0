use std::env;
use std::str::FromStr;

use crate::error::{PayablesError, Result};

/// Runtime configuration, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub db_max_connections: u32,
    /// How often the overdue sweeper wakes up.
    pub sweeper_poll_interval_seconds: u64,
    /// Maximum bills re-derived per sweep.
    pub sweeper_batch_size: i64,
}

impl Config {
    /// Builds the configuration from environment variables.
    ///
    /// `DATABASE_URL` and `JWT_SECRET` are required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parsed("SERVER_PORT", 3000)?,
            jwt_secret: required("JWT_SECRET")?,
            db_max_connections: parsed("DB_MAX_CONNECTIONS", 10)?,
            sweeper_poll_interval_seconds: parsed("SWEEPER_POLL_INTERVAL_SECONDS", 3600)?,
            sweeper_batch_size: parsed("SWEEPER_BATCH_SIZE", 500)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| PayablesError::Config(format!("{} must be set", key)))
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| PayablesError::Config(format!("Invalid {}: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_falls_back_to_default_when_unset() {
        let value: u16 = parsed("PAYABLES_TEST_UNSET_PORT", 3000).unwrap();
        assert_eq!(value, 3000);
    }

    #[test]
    fn test_parsed_rejects_garbage() {
        env::set_var("PAYABLES_TEST_BAD_PORT", "not-a-port");
        let result: Result<u16> = parsed("PAYABLES_TEST_BAD_PORT", 3000);
        assert!(matches!(result, Err(PayablesError::Config(_))));
    }

    #[test]
    fn test_bind_address() {
        let config = Config {
            database_url: "postgres://localhost/payables".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            jwt_secret: "secret".to_string(),
            db_max_connections: 5,
            sweeper_poll_interval_seconds: 60,
            sweeper_batch_size: 100,
        };
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }
}
