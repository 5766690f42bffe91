//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::policy::DEFAULT_SHARE_UNIT_PRICE;

/// Where the unit price cache lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceCacheBackend {
    /// Shared `price_cache` table; safe with several instances
    Postgres,
    /// In-process Moka cache; single instance only
    Local,
}

impl FromStr for PriceCacheBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(PriceCacheBackend::Postgres),
            "local" => Ok(PriceCacheBackend::Local),
            _ => Err(ConfigError::InvalidValue("PRICE_CACHE_BACKEND")),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Lifetime of a cached unit price
    pub unit_price_cache_ttl: Duration,

    /// Price served before any price is recorded; 0 disables the fallback
    pub default_share_unit_price: i64,

    pub price_cache_backend: PriceCacheBackend,
}

fn parse_env<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_env("DATABASE_MAX_CONNECTIONS", "10")?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = parse_env("PORT", "3000")?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let ttl_secs: u64 = parse_env("UNIT_PRICE_CACHE_TTL_SECS", "600")?;

        let default_share_unit_price: i64 = parse_env(
            "DEFAULT_SHARE_UNIT_PRICE",
            &DEFAULT_SHARE_UNIT_PRICE.to_string(),
        )?;
        if default_share_unit_price < 0 {
            return Err(ConfigError::InvalidValue("DEFAULT_SHARE_UNIT_PRICE"));
        }

        let price_cache_backend = parse_env("PRICE_CACHE_BACKEND", "postgres")?;

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            unit_price_cache_ttl: Duration::from_secs(ttl_secs),
            default_share_unit_price,
            price_cache_backend,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
