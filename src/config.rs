use crate::cache::CacheTtl;
use crate::domain::Decimal;
use crate::rates::{ConflictThresholds, RetryPolicy};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub conflict_thresholds: ConflictThresholds,
    pub cache_ttl: CacheTtl,
    pub bulk_concurrency: usize,
    pub ledger_retry: RetryPolicy,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", 8080u16, "must be a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let defaults = ConflictThresholds::default();
        let conflict_thresholds = ConflictThresholds {
            upfront: threshold(&env_map, "UPFRONT_CONFLICT_THRESHOLD", defaults.upfront)?,
            residual: threshold(&env_map, "RESIDUAL_CONFLICT_THRESHOLD", defaults.residual)?,
        };

        let fresh_secs = parse_or(&env_map, "CACHE_FRESH_TTL_SECS", 60u64, "must be whole seconds")?;
        let stale_secs = parse_or(&env_map, "CACHE_STALE_TTL_SECS", 300u64, "must be whole seconds")?;
        if stale_secs < fresh_secs {
            return Err(ConfigError::InvalidValue(
                "CACHE_STALE_TTL_SECS".to_string(),
                format!("must be at least CACHE_FRESH_TTL_SECS ({})", fresh_secs),
            ));
        }
        let cache_ttl = CacheTtl::new(
            Duration::from_secs(fresh_secs),
            Duration::from_secs(stale_secs),
        );

        let bulk_concurrency = parse_or(&env_map, "BULK_CONCURRENCY", 4usize, "must be a positive integer")?;
        if bulk_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "BULK_CONCURRENCY".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let max_attempts = parse_or(&env_map, "LEDGER_MAX_ATTEMPTS", 5u32, "must be a positive integer")?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "LEDGER_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let max_elapsed_ms = parse_or(
            &env_map,
            "LEDGER_RETRY_MAX_ELAPSED_MS",
            2000u64,
            "must be whole milliseconds",
        )?;
        let ledger_retry = RetryPolicy {
            max_attempts,
            max_elapsed: Duration::from_millis(max_elapsed_ms),
            ..RetryPolicy::default()
        };

        Ok(Config {
            port,
            database_path,
            conflict_thresholds,
            cache_ttl,
            bulk_concurrency,
            ledger_retry,
        })
    }
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    expectation: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), expectation.to_string())),
    }
}

fn threshold(
    env_map: &HashMap<String, String>,
    key: &str,
    default: Decimal,
) -> Result<Decimal, ConfigError> {
    let value = parse_or(env_map, key, default, "must be a decimal number")?;
    if value.is_negative() || value > Decimal::hundred() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be within [0, 100]".to_string(),
        ));
    }
    Ok(value)
}
