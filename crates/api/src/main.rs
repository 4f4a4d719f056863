//! Standalone API server binary.
//!
//! The `cli` crate's `serve-api` subcommand is the supported way to run this in
//! production (it shares the unified shutdown and tracing setup); this binary exists for
//! running the API server in isolation during development.

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,api=debug,sqlx=warn".into()))
        .init();

    let config = api::config::Config::from_env()?;
    tracing::info!(host = %config.host, port = config.port, "loaded API server configuration");

    let pool = PgPoolOptions::new()
        .max_connections(config.core.db_max_connections)
        .connect(&config.core.database_url)
        .await?;

    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("database migrations complete");

    api::run_api(pool, &config).await
}
