//! Connection configuration.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable not set
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    /// Variable set but not parsable
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
    },

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Pool could not be created
    #[error("Failed to connect: {0}")]
    Connect(#[source] sqlx::Error),
}

/// `PostgreSQL` pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    /// Connection string
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl PostgresConfig {
    /// Settings for `url` with pool defaults.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout_secs: 10,
        }
    }

    /// Load from the environment.
    ///
    /// - `DATABASE_URL` (required)
    /// - `DATABASE_MAX_CONNECTIONS` (default 10)
    /// - `DATABASE_MIN_CONNECTIONS` (default 0)
    /// - `DATABASE_CONNECT_TIMEOUT` seconds (default 10)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `DATABASE_URL` is missing or a numeric
    /// variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::EnvVarNotSet("DATABASE_URL".to_string()))?;
        let mut config = Self::new(url);

        if let Some(max) = parse_var("DATABASE_MAX_CONNECTIONS")? {
            config.max_connections = max;
        }
        if let Some(min) = parse_var("DATABASE_MIN_CONNECTIONS")? {
            config.min_connections = min;
        }
        if let Some(timeout) = parse_var("DATABASE_CONNECT_TIMEOUT")? {
            config.connect_timeout_secs = timeout;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] on an unusable setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "max_connections must be > 0".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(ConfigError::ValidationError(
                "min_connections must not exceed max_connections".to_string(),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Get connect timeout as Duration
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Open a pool with these settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Connect`] if the database is unreachable.
    pub async fn connect(&self) -> Result<PgPool, ConfigError> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.connect_timeout())
            .connect(&self.url)
            .await
            .map_err(ConfigError::Connect)
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
        Err(_) => Ok(None),
    }
}
