//! Ambient startup plumbing shared by every binary in this workspace: environment loading,
//! tracing initialization, and database pool construction.

use anyhow::Result;
use outbox_core::CoreConfig;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Load `.env` if present. Safe to call more than once.
pub fn init_env() {
    dotenvy::dotenv().ok();
}

/// Initialize tracing with an env-filter and optional rolling file output, the same way
/// for every binary so logs from different processes are shaped identically.
///
/// The returned guard must be kept alive for the duration of the process — dropping it
/// stops the non-blocking file writer from flushing.
pub fn init_tracing(service_name: &str) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let default_filter = format!("info,{service_name}=debug,sqlx=warn");

    let stdout_layer = tracing_subscriber::fmt::layer();
    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(stdout_layer);

    let enable_file_logging = std::env::var("ENABLE_FILE_LOGGING")
        .map(|v| v != "false" && v != "0")
        .unwrap_or(false);

    if enable_file_logging {
        let file_appender = tracing_appender::rolling::daily(&log_dir, format!("{service_name}.log"));
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking)
                    .json(),
            )
            .init();

        Some(guard)
    } else {
        registry.init();
        None
    }
}

/// Construct the shared connection pool used by every process in this workspace.
pub async fn init_db(config: &CoreConfig) -> Result<sqlx::PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .idle_timeout(std::time::Duration::from_secs(300))
        .max_lifetime(std::time::Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;

    tracing::info!(max_connections = config.db_max_connections, "database pool established");
    Ok(pool)
}
