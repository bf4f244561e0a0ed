//! PostgreSQL configuration

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(String),

    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { key: key.to_string(), reason: reason.into() }
}

/// Reads an optional numeric environment variable
fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(key, format!("'{}' is not a non-negative integer", raw))),
        Err(_) => Ok(None),
    }
}

/// Connection settings for the PostGIS-backed store
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub database_url: String,
    pub pool: PoolConfig,
    /// Upper bound for committing or rolling back one entity's writes
    pub unit_timeout: Duration,
    /// Run pending migrations when the store connects
    pub auto_migrate: bool,
}

impl PostgresConfig {
    /// Load configuration from environment variables
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `DATABASE_URL` | required |
    /// | `CADSYNC_DB_MIN_CONNECTIONS` | 2 |
    /// | `CADSYNC_DB_MAX_CONNECTIONS` | 10 |
    /// | `CADSYNC_DB_ACQUIRE_TIMEOUT_SECS` | 30 |
    /// | `CADSYNC_DB_UNIT_TIMEOUT_SECS` | 30 |
    /// | `CADSYNC_DB_AUTO_MIGRATE` | false |
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::Missing("DATABASE_URL".to_string()))?;
        if database_url.trim().is_empty() {
            return Err(invalid("DATABASE_URL", "cannot be empty"));
        }

        let mut config = Self::with_url(database_url);
        config.pool = PoolConfig::from_env()?;
        if let Some(secs) = env_number::<u64>("CADSYNC_DB_UNIT_TIMEOUT_SECS")? {
            config.unit_timeout = Duration::from_secs(secs);
        }
        if let Ok(value) = std::env::var("CADSYNC_DB_AUTO_MIGRATE") {
            config.auto_migrate =
                matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        config.validate()?;
        Ok(config)
    }

    /// Configuration for `database_url` with default pool settings
    pub fn new(database_url: String) -> Result<Self, ConfigError> {
        let config = Self::with_url(database_url);
        config.validate()?;
        Ok(config)
    }

    fn with_url(database_url: String) -> Self {
        Self {
            database_url,
            pool: PoolConfig::default(),
            unit_timeout: Duration::from_secs(30),
            auto_migrate: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(invalid("database_url", "cannot be empty"));
        }
        if self.unit_timeout.is_zero() {
            return Err(invalid("unit_timeout", "must be greater than 0"));
        }
        self.pool.validate()
    }
}

/// Connection pool settings handed to `PgPoolOptions`
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 2,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(10 * 60),
            max_lifetime: Duration::from_secs(30 * 60),
        }
    }
}

impl PoolConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut pool = Self::default();
        if let Some(min) = env_number("CADSYNC_DB_MIN_CONNECTIONS")? {
            pool.min_connections = min;
        }
        if let Some(max) = env_number("CADSYNC_DB_MAX_CONNECTIONS")? {
            pool.max_connections = max;
        }
        if let Some(secs) = env_number::<u64>("CADSYNC_DB_ACQUIRE_TIMEOUT_SECS")? {
            pool.acquire_timeout = Duration::from_secs(secs);
        }
        Ok(pool)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(invalid("pool.max_connections", "must be greater than 0"));
        }
        if self.min_connections > self.max_connections {
            return Err(invalid(
                "pool.min_connections",
                format!(
                    "{} exceeds max_connections ({})",
                    self.min_connections, self.max_connections
                ),
            ));
        }
        if self.acquire_timeout.is_zero() {
            return Err(invalid("pool.acquire_timeout", "must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "postgresql://localhost/cadsync";

    #[test]
    fn test_new_uses_defaults() {
        let config = PostgresConfig::new(URL.to_string()).unwrap();
        assert!(!config.auto_migrate);
        assert_eq!(config.unit_timeout, Duration::from_secs(30));
        assert_eq!(config.pool.min_connections, 2);
        assert_eq!(config.pool.max_connections, 10);
    }

    #[test]
    fn test_blank_url_rejected() {
        match PostgresConfig::new("  ".to_string()) {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "database_url"),
            other => panic!("Expected Invalid error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_unit_timeout_rejected() {
        let mut config = PostgresConfig::new(URL.to_string()).unwrap();
        config.unit_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pool_bounds() {
        assert!(PoolConfig::default().validate().is_ok());

        let inverted = PoolConfig { min_connections: 20, ..PoolConfig::default() };
        assert!(inverted.validate().is_err());

        let empty = PoolConfig { min_connections: 0, max_connections: 0, ..PoolConfig::default() };
        assert!(empty.validate().is_err());

        let no_wait = PoolConfig { acquire_timeout: Duration::ZERO, ..PoolConfig::default() };
        assert!(no_wait.validate().is_err());
    }
}
