//! Configuration surface for the outbox relay and its collaborators.
//!
//! Every value is loaded from an environment variable with a sane default, in the same
//! style as the rest of this codebase (`Config::from_env` in the relay driver, `CoreConfig`
//! here). `.env` is loaded once via `dotenvy` the first time any `from_env` is called.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} must be a valid value: {e}")),
        Err(_) => Ok(default),
    }
}

/// Common configuration shared by every binary in this workspace.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Max size of the shared `sqlx::PgPool`.
    pub db_max_connections: u32,
}

impl CoreConfig {
    /// Load common configuration from environment variables, loading `.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10u32)?,
        })
    }
}

/// Relay engine tuning knobs (§6.2 `outbox.*` / `dispatch.*`).
#[derive(Debug, Clone)]
pub struct OutboxConfig {
    /// Attempt cap before a row transitions to `Failed` instead of `Retrying`.
    pub max_retries: i64,
    /// Semaphore capacity per driver — bounds concurrent in-flight dispatches.
    pub max_concurrency: usize,
    /// Rows claimed per claim transaction.
    pub max_batch_size: i64,
    /// Upper bound, in milliseconds, of the jittered pacing sleep between claim phases.
    pub duration_interval_ms: u64,
    /// How long a row may sit in `Processing` before the reaper demotes it back to
    /// `Retrying`.
    pub reclaim_after: Duration,
    /// Per-row dispatch deadline.
    pub dispatch_timeout: Duration,
}

impl OutboxConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            max_retries: env_or("OUTBOX_MAX_RETRIES", 5)?,
            max_concurrency: env_or("OUTBOX_MAX_CONCURRENCY", 10usize)?,
            max_batch_size: env_or("OUTBOX_MAX_BATCH_SIZE", 100)?,
            duration_interval_ms: env_or("OUTBOX_DURATION_INTERVAL_MS", 1_000u64)?,
            reclaim_after: Duration::from_secs(env_or("OUTBOX_RECLAIM_AFTER_SECS", 300u64)?),
            dispatch_timeout: Duration::from_secs(env_or("DISPATCH_TIMEOUT_SECS", 30u64)?),
        })
    }
}

/// Exponential backoff parameters for the retry policy (§4.3).
///
/// The original source carries two differing interval pairs across its outbox worker
/// variants (1 min / 3 min in one, 5 min / 10 min in the other). Both remain
/// configurable; the default below matches the 5 min / 10 min / 1 hour / 0.5 variant that
/// is wired directly into the claim-then-dispatch loop rather than a standalone constants
/// file.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: i64,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// Soft overall deadline across all retries of one row. Advisory only —
    /// `next_backoff` does not enforce it; nothing in this codebase currently reads it
    /// besides operators auditing how long a row may keep retrying.
    pub max_elapsed_time: Duration,
    pub multiplier: f64,
    pub randomization_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_interval: Duration::from_secs(5 * 60),
            max_interval: Duration::from_secs(10 * 60),
            max_elapsed_time: Duration::from_secs(60 * 60),
            multiplier: 2.0,
            randomization_factor: 0.5,
        }
    }
}

impl RetryConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            max_retries: env_or("OUTBOX_MAX_RETRIES", defaults.max_retries)?,
            initial_interval: Duration::from_secs(env_or(
                "RETRY_INITIAL_INTERVAL_SECS",
                defaults.initial_interval.as_secs(),
            )?),
            max_interval: Duration::from_secs(env_or(
                "RETRY_MAX_INTERVAL_SECS",
                defaults.max_interval.as_secs(),
            )?),
            max_elapsed_time: Duration::from_secs(env_or(
                "RETRY_MAX_ELAPSED_TIME_SECS",
                defaults.max_elapsed_time.as_secs(),
            )?),
            multiplier: defaults.multiplier,
            randomization_factor: defaults.randomization_factor,
        })
    }
}
