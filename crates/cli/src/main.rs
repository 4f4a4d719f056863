//! Operational entry point: one binary, three sub-commands (§6.4).
//!
//! Generalized from the source system's single unified-server binary, which always
//! started every service in one process. Here each sub-command starts exactly the
//! component it names, because the producer-side API and the relay engine are meant to
//! scale and deploy independently — an operator runs as many relay drivers as they like
//! against the same database, on as many hosts as they like, without ever starting an API
//! listener alongside.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use outbox_core::{CoreConfig, OutboxConfig, RetryConfig};
use outbox_sinks::{HttpTaskQueueSink, SinkRegistry, TaskQueueSinkConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "outboxd", about = "Transactional outbox relay: API, relay driver, migrations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the producer-side API server.
    ServeApi,
    /// Start one or more relay drivers (claim, dispatch, pace) plus a shared reaper.
    ///
    /// Correctness does not depend on driver count — every driver claims against the same
    /// pool and `SELECT ... FOR UPDATE SKIP LOCKED` keeps their batches disjoint (§4.4,
    /// §5). Running several in one process is equivalent to running several processes.
    #[command(name = "relay")]
    Relay {
        /// Number of relay driver loops to run concurrently in this process.
        #[arg(long, default_value_t = 1)]
        drivers: usize,
    },
    /// Apply pending database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    shared::init_env();

    let cli = Cli::parse();

    let service_name = match cli.command {
        Command::ServeApi => "api",
        Command::Relay { .. } => "relay",
        Command::Migrate => "migrate",
    };
    let _guard = shared::init_tracing(service_name);

    let result = match cli.command {
        Command::ServeApi => serve_api().await,
        Command::Relay { drivers } => serve_relay(drivers).await,
        Command::Migrate => migrate().await,
    };

    if let Err(ref e) = result {
        tracing::error!("{service_name} exited with error: {e:#}");
    }

    result
}

async fn serve_api() -> Result<()> {
    let config = api::config::Config::from_env().context("loading API configuration")?;
    let pool = shared::init_db(&config.core).await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    tokio::select! {
        result = api::run_api(pool, &config) => result,
        () = wait_for_shutdown() => Ok(()),
    }
}

/// Run `drivers` `RelayDriver` loops concurrently in this process, sharing one pool, one
/// sink registry, and one reaper. Correctness does not depend on `drivers` — each loop
/// claims independently and `SELECT ... FOR UPDATE SKIP LOCKED` keeps their batches
/// disjoint (§4.4, §5); this is purely a way to raise in-process throughput without
/// starting a second OS process.
async fn serve_relay(drivers: usize) -> Result<()> {
    anyhow::ensure!(drivers >= 1, "--drivers must be at least 1");

    let core_cfg = CoreConfig::from_env().context("loading core configuration")?;
    let outbox_cfg = OutboxConfig::from_env().context("loading outbox configuration")?;
    let retry_cfg = RetryConfig::from_env().context("loading retry configuration")?;
    let task_queue_cfg =
        TaskQueueSinkConfig::from_env().context("loading task queue sink configuration")?;

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

    let driver_handles: Vec<_> = (0..drivers)
        .map(|n| {
            let driver = relay::RelayDriver::new(
                pool.clone(),
                sinks.clone(),
                outbox_cfg.clone(),
                retry_cfg.clone(),
            );
            tracing::info!(driver = n, "starting relay driver");
            tokio::spawn(driver.run(shutdown.clone()))
        })
        .collect();

    wait_for_shutdown().await;
    tracing::info!(drivers, "shutdown signal received, draining relay drivers");
    shutdown.cancel();

    for handle in driver_handles {
        handle.await.context("relay driver task panicked")??;
    }
    reaper.await.context("reaper task panicked")?;

    tracing::info!("relay drivers stopped cleanly");
    Ok(())
}

async fn migrate() -> Result<()> {
    let core_cfg = CoreConfig::from_env().context("loading core configuration")?;
    let pool = shared::init_db(&core_cfg).await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("migrations applied");
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
