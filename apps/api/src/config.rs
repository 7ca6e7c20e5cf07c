use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::resume::cache::CacheTtls;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Projection cache backend; in-process cache when unset.
    pub redis_url: Option<String>,
    /// Seed document override; the built-in document is used when unset.
    pub seed_path: Option<PathBuf>,
    pub reconcile_on_startup: bool,
    pub resume_cache_ttl_secs: u64,
    pub stats_cache_ttl_secs: u64,
    pub metrics_cache_ttl_secs: u64,
    /// Enables `POST /api/resume/reconcile` when set.
    pub admin_token: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: optional_env("REDIS_URL"),
            seed_path: optional_env("SEED_PATH").map(PathBuf::from),
            reconcile_on_startup: match optional_env("RECONCILE_ON_STARTUP") {
                Some(v) => parse_flag(&v)
                    .with_context(|| format!("RECONCILE_ON_STARTUP must be true/false, got '{v}'"))?,
                None => true,
            },
            resume_cache_ttl_secs: ttl_env("RESUME_CACHE_TTL_SECS", 600)?,
            stats_cache_ttl_secs: ttl_env("STATS_CACHE_TTL_SECS", 60)?,
            metrics_cache_ttl_secs: ttl_env("METRICS_CACHE_TTL_SECS", 300)?,
            admin_token: optional_env("ADMIN_TOKEN"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            projection: self.resume_cache_ttl_secs,
            stats: self.stats_cache_ttl_secs,
            metrics: self.metrics_cache_ttl_secs,
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/folio_test".to_string(),
            redis_url: None,
            seed_path: None,
            reconcile_on_startup: false,
            resume_cache_ttl_secs: 600,
            stats_cache_ttl_secs: 60,
            metrics_cache_ttl_secs: 300,
            admin_token: None,
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank are treated the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn ttl_env(key: &str, default: u64) -> Result<u64> {
    Ok(optional_env(key)
        .map(|v| v.parse::<u64>())
        .transpose()
        .with_context(|| format!("{key} must be a whole number of seconds"))?
        .unwrap_or(default))
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("unrecognised flag value '{other}'"),
    }
}
