//! Standalone relay driver binary.
//!
//! The `cli` crate's `relay` subcommand is the supported way to run this in production
//! (and the only way to run more than one driver in-process via `--drivers`); this binary
//! exists for running a single driver in isolation during development.

use anyhow::Result;
use outbox_core::{CoreConfig, OutboxConfig, RetryConfig};
use outbox_sinks::{HttpTaskQueueSink, SinkRegistry, TaskQueueSinkConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    shared::init_env();
    let _guard = shared::init_tracing("relay");

    let core_cfg = CoreConfig::from_env()?;
    let outbox_cfg = OutboxConfig::from_env()?;
    let retry_cfg = RetryConfig::from_env()?;
    let task_queue_cfg = TaskQueueSinkConfig::from_env()?;

    let pool = shared::init_db(&core_cfg).await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    let sinks = Arc::new(
        SinkRegistry::new().register(
            outbox_core::DestinationType::TaskQueue,
            Arc::new(HttpTaskQueueSink::new(task_queue_cfg)),
        ),
    );

    let shutdown = CancellationToken::new();
    let reaper = relay::spawn_reaper(pool.clone(), outbox_cfg.reclaim_after, shutdown.clone());
    let driver = relay::RelayDriver::new(pool, sinks, outbox_cfg, retry_cfg);

    let driver_shutdown = shutdown.clone();
    let driver_handle = tokio::spawn(driver.run(driver_shutdown));

    wait_for_shutdown().await;
    tracing::info!("shutdown signal received, draining relay driver");
    shutdown.cancel();

    driver_handle.await??;
    reaper.await?;

    tracing::info!("relay driver stopped cleanly");
    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
