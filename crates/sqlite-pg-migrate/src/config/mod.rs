//! Configuration loading and validation.
//!
//! Configuration comes from the process environment. A `.env` file in the
//! working directory is loaded first when present.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};

/// Environment variable names.
pub mod env {
    pub const SQLITE_DB_PATH: &str = "SQLITE_DB_PATH";
    pub const POSTGRES_HOST: &str = "POSTGRES_HOST";
    pub const POSTGRES_PORT: &str = "POSTGRES_PORT";
    pub const POSTGRES_DB: &str = "POSTGRES_DB";
    pub const POSTGRES_USER: &str = "POSTGRES_USER";
    pub const POSTGRES_PASSWORD: &str = "POSTGRES_PASSWORD";
    pub const POSTGRES_SCHEMA: &str = "POSTGRES_SCHEMA";
    pub const POSTGRES_SSL_MODE: &str = "POSTGRES_SSL_MODE";
    pub const BATCH_SIZE: &str = "BATCH_SIZE";
}

impl Config {
    /// Load configuration from the environment, honoring a `.env` file.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| MigrateError::Config(format!("{} must be set", key)))
        };

        let port = match get(env::POSTGRES_PORT) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                MigrateError::Config(format!("{} must be a port number, got '{}'", env::POSTGRES_PORT, raw))
            })?,
            None => TargetConfig::default_port(),
        };

        let batch_size = match get(env::BATCH_SIZE) {
            Some(raw) => Some(raw.trim().parse::<usize>().map_err(|_| {
                MigrateError::Config(format!("{} must be a positive integer, got '{}'", env::BATCH_SIZE, raw))
            })?),
            None => None,
        };

        let config = Config {
            source: SourceConfig {
                path: required(env::SQLITE_DB_PATH)?.into(),
            },
            target: TargetConfig {
                host: required(env::POSTGRES_HOST)?,
                port,
                database: required(env::POSTGRES_DB)?,
                user: required(env::POSTGRES_USER)?,
                password: get(env::POSTGRES_PASSWORD).unwrap_or_default(),
                schema: get(env::POSTGRES_SCHEMA).unwrap_or_else(TargetConfig::default_schema),
                ssl_mode: get(env::POSTGRES_SSL_MODE).unwrap_or_else(TargetConfig::default_ssl_mode),
            },
            migration: MigrationConfig { batch_size },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            (env::SQLITE_DB_PATH, "db.sqlite"),
            (env::POSTGRES_HOST, "127.0.0.1"),
            (env::POSTGRES_DB, "movies_database"),
            (env::POSTGRES_USER, "app"),
            (env::POSTGRES_PASSWORD, "123qwe"),
        ]
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup(&base())).unwrap();
        assert_eq!(config.target.port, 5432);
        assert_eq!(config.target.schema, "content");
        assert_eq!(config.target.ssl_mode, "disable");
        assert_eq!(config.migration.get_batch_size(), DEFAULT_BATCH_SIZE);
        assert_eq!(config.source.path.to_str(), Some("db.sqlite"));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = base();
        pairs.push((env::POSTGRES_PORT, "6432"));
        pairs.push((env::BATCH_SIZE, "250"));
        pairs.push((env::POSTGRES_SCHEMA, "staging"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.target.port, 6432);
        assert_eq!(config.migration.get_batch_size(), 250);
        assert_eq!(config.target.schema, "staging");
    }

    #[test]
    fn test_missing_sqlite_path() {
        let pairs: Vec<_> = base()
            .into_iter()
            .filter(|(k, _)| *k != env::SQLITE_DB_PATH)
            .collect();
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("SQLITE_DB_PATH"));
    }

    #[test]
    fn test_empty_value_is_unset() {
        let mut pairs = base();
        pairs.retain(|(k, _)| *k != env::POSTGRES_HOST);
        pairs.push((env::POSTGRES_HOST, "  "));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_invalid_port() {
        let mut pairs = base();
        pairs.push((env::POSTGRES_PORT, "not-a-port"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut pairs = base();
        pairs.push((env::BATCH_SIZE, "0"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }
}
