use std::ops::RangeInclusive;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Duration;

/// JWT secrets that must never reach a running server.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DELAY_SECS: RangeInclusive<i64> = 0..=366 * 24 * 60 * 60;
const TOKEN_TTL_DAYS: RangeInclusive<i64> = 1..=3650;
const MAX_UPLOAD_MB: RangeInclusive<usize> = 1..=1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// Gap between sending a letter and it becoming unlockable.
    pub delivery_delay: Duration,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub token_ttl_days: i64,
    pub max_content_chars: usize,
}

impl Config {
    /// Builds the config from `DEARLY_*` variables looked up through `var`.
    pub fn from_env<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = var("DEARLY_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("DEARLY_JWT_SECRET is unset or still a placeholder");
        }

        let delay_secs = parse_in(&var, "DEARLY_DELIVERY_DELAY_SECS", 15, DELAY_SECS)?;
        let max_upload_mb = parse_in(&var, "DEARLY_MAX_UPLOAD_MB", 10, MAX_UPLOAD_MB)?;

        Ok(Self {
            host: var("DEARLY_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&var, "DEARLY_PORT", 3000)?,
            db_path: var("DEARLY_DB_PATH").unwrap_or_else(|| "dearly.db".into()).into(),
            jwt_secret,
            delivery_delay: Duration::seconds(delay_secs),
            upload_dir: var("DEARLY_UPLOAD_DIR").unwrap_or_else(|| "./uploads".into()).into(),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            token_ttl_days: parse_in(&var, "DEARLY_TOKEN_TTL_DAYS", 30, TOKEN_TTL_DAYS)?,
            max_content_chars: 10_000,
        })
    }

    /// Defaults with an explicit secret, for tests and embedding.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            db_path: ":memory:".into(),
            jwt_secret: jwt_secret.into(),
            delivery_delay: Duration::seconds(15),
            upload_dir: "./uploads".into(),
            max_upload_bytes: 10 * 1024 * 1024,
            token_ttl_days: 30,
            max_content_chars: 10_000,
        }
    }
}

/// Like `parse_or`, but the value must fall inside `range`.
fn parse_in<F, T>(var: &F, key: &str, default: T, range: RangeInclusive<T>) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd + std::fmt::Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = parse_or(var, key, default)?;
    if !range.contains(&value) {
        bail!(
            "{} must be between {} and {}, got {}",
            key,
            range.start(),
            range.end(),
            value
        );
    }
    Ok(value)
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}
