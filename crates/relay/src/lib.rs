//! The relay engine: one or more drivers, each running claim/dispatch/pace in a loop, plus
//! a sibling reaper task.
//!
//! Grounded in the source worker's `run_worker_loop` — a `tokio::select!` loop that fans
//! claimed work out onto a `JoinSet` without blocking the next fetch on dispatch
//! completion — generalized from one fixed channel-driven fetch cycle to the claim →
//! mark-processing → commit → bounded-concurrency-dispatch → pace cycle this system's rows
//! require.

mod dispatch;
mod reaper;

pub use reaper::spawn_reaper;

use dispatch::dispatch_row;
use outbox_core::{OutboxConfig, RetryConfig};
use outbox_sinks::SinkRegistry;
use rand::Rng;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// One claim/dispatch/pace driver. Multiple drivers may run against the same pool and
/// `max_batch_size`; `FOR UPDATE SKIP LOCKED` guarantees their claimed batches never
/// overlap.
#[derive(Clone)]
pub struct RelayDriver {
    pool: PgPool,
    sinks: Arc<SinkRegistry>,
    outbox_cfg: OutboxConfig,
    retry_cfg: RetryConfig,
}

impl RelayDriver {
    #[must_use]
    pub fn new(
        pool: PgPool,
        sinks: Arc<SinkRegistry>,
        outbox_cfg: OutboxConfig,
        retry_cfg: RetryConfig,
    ) -> Self {
        Self {
            pool,
            sinks,
            outbox_cfg,
            retry_cfg,
        }
    }

    /// Run the claim/dispatch/pace loop until `shutdown` is cancelled, then drain
    /// in-flight dispatches before returning.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.outbox_cfg.max_concurrency));
        let mut dispatches = JoinSet::new();
        let mut is_shutdown = false;

        loop {
            if is_shutdown && dispatches.is_empty() {
                info!("relay driver shutdown complete");
                break;
            }

            tokio::select! {
                () = shutdown.cancelled(), if !is_shutdown => {
                    info!("relay driver received shutdown signal, draining in-flight dispatches");
                    is_shutdown = true;
                }

                Some(res) = dispatches.join_next(), if !dispatches.is_empty() => {
                    if let Err(e) = res {
                        error!("dispatch task panicked: {e}");
                    }
                }

                () = self.claim_and_fan_out(&semaphore, &mut dispatches), if !is_shutdown => {}
            }
        }

        Ok(())
    }

    /// Phase A (claim) + Phase B (fan out dispatch tasks) + Phase C (pace). Runs one full
    /// cycle and returns — the caller loops. Never blocks on dispatch completion; claimed
    /// rows are handed to `dispatches` and the pacing sleep happens regardless of how long
    /// dispatch takes.
    async fn claim_and_fan_out(&self, semaphore: &Arc<Semaphore>, dispatches: &mut JoinSet<()>) {
        let now = chrono::Utc::now();

        let claimed = match self.pool.begin().await {
            Ok(mut txn) => {
                match outbox_store::claim_batch(&mut txn, now, self.outbox_cfg.max_batch_size).await {
                    Ok(rows) if rows.is_empty() => {
                        let _ = txn.rollback().await;
                        Vec::new()
                    }
                    Ok(mut rows) => {
                        let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
                        if let Err(e) = outbox_store::mark_processing(&mut txn, &ids).await {
                            warn!("mark_processing failed, rolling back claim: {e}");
                            let _ = txn.rollback().await;
                            Vec::new()
                        } else if let Err(e) = txn.commit().await {
                            warn!("claim commit failed: {e}");
                            Vec::new()
                        } else {
                            // `mark_processing` just incremented `attempt` in the database;
                            // reflect that in the in-memory rows so dispatch sees the
                            // post-increment value rather than the stale pre-claim one.
                            for row in &mut rows {
                                row.attempt += 1;
                            }
                            rows
                        }
                    }
                    Err(e) => {
                        error!("claim_batch failed: {e}");
                        let _ = txn.rollback().await;
                        Vec::new()
                    }
                }
            }
            Err(e) => {
                error!("failed to open claim transaction: {e}");
                Vec::new()
            }
        };

        if !claimed.is_empty() {
            info!("claimed {} row(s) for dispatch", claimed.len());
        }

        for row in claimed {
            let pool = self.pool.clone();
            let sinks = self.sinks.clone();
            let retry_cfg = self.retry_cfg.clone();
            let max_retries = self.outbox_cfg.max_retries;
            let dispatch_timeout = self.outbox_cfg.dispatch_timeout;
            let semaphore = semaphore.clone();

            dispatches.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                dispatch_row(&pool, &sinks, &retry_cfg, max_retries, dispatch_timeout, row).await;
            });
        }

        pace(self.outbox_cfg.duration_interval_ms).await;
    }
}

/// Sleep a jittered interval uniformly in `[0, upper_ms]`. Always yields at least once so a
/// `duration_interval_ms = 0` configuration doesn't spin the claim loop hot.
async fn pace(upper_ms: u64) {
    if upper_ms == 0 {
        tokio::task::yield_now().await;
        return;
    }

    let millis = rand::rng().random_range(0..=upper_ms);
    tokio::time::sleep(Duration::from_millis(millis)).await;
}
