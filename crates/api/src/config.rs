//! Server configuration from environment variables.

use anyhow::{Context, Result};
use outbox_core::CoreConfig;
use std::env;

/// Producer-side API server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub core: CoreConfig,
    pub host: String,
    pub port: u16,
    pub cors_allowed_origin: String,
}

impl Config {
    /// Load configuration from environment variables, loading `.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            core: CoreConfig::from_env()?,
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("API_PORT must be a valid port number")?,
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN").unwrap_or_else(|_| "*".to_string()),
        })
    }
}
