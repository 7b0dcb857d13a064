use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::matching::pipeline::{
    EngineSettings, DEFAULT_SCORER_TIMEOUT, DEFAULT_SYNC_BATCH_CAP, DEFAULT_SYNC_CONCURRENCY,
};

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or an optional one is malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub scorer_timeout_secs: u64,
    pub sync_batch_cap: usize,
    pub sync_concurrency: usize,
    pub match_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: optional_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            scorer_timeout_secs: optional_env(
                "SCORER_TIMEOUT_SECS",
                DEFAULT_SCORER_TIMEOUT.as_secs(),
            )?,
            sync_batch_cap: at_least_one(
                "SYNC_BATCH_CAP",
                optional_env("SYNC_BATCH_CAP", DEFAULT_SYNC_BATCH_CAP)?,
            )?,
            sync_concurrency: at_least_one(
                "SYNC_CONCURRENCY",
                optional_env("SYNC_CONCURRENCY", DEFAULT_SYNC_CONCURRENCY)?,
            )?,
            match_cache_ttl_secs: optional_env("MATCH_CACHE_TTL_SECS", 3600)?,
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            scorer_timeout: Duration::from_secs(self.scorer_timeout_secs),
            sync_batch_cap: self.sync_batch_cap,
            sync_concurrency: self.sync_concurrency,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => parse_var(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'"))
}

/// Zero would make every sync cycle a silent no-op.
fn at_least_one(key: &str, value: usize) -> Result<usize> {
    if value == 0 {
        anyhow::bail!("Environment variable '{key}' must be at least 1");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_accepts_numbers() {
        assert_eq!(parse_var::<u16>("PORT", " 9000 ").unwrap(), 9000);
        assert_eq!(parse_var::<usize>("SYNC_BATCH_CAP", "250").unwrap(), 250);
    }

    #[test]
    fn test_parse_var_error_names_variable() {
        let err = parse_var::<u64>("SCORER_TIMEOUT_SECS", "soon").unwrap_err();
        assert!(err.to_string().contains("SCORER_TIMEOUT_SECS"));
    }

    #[test]
    fn test_sync_limits_reject_zero() {
        assert_eq!(at_least_one("SYNC_BATCH_CAP", 1).unwrap(), 1);
        let err = at_least_one("SYNC_BATCH_CAP", 0).unwrap_err();
        assert!(err.to_string().contains("SYNC_BATCH_CAP"));
        assert!(at_least_one("SYNC_CONCURRENCY", 0).is_err());
    }
}
