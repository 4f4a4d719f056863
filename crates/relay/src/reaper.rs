//! The reaper: a sibling task that periodically demotes rows stuck in `Processing`.
//!
//! Absent from the source system entirely — its outbox worker has no recovery path for a
//! row left in-flight by a crash between commit and dispatch-finalize. A hardening
//! addition over that source, not a bug-for-bug port.

use chrono::Duration as ChronoDuration;
use sqlx::PgPool;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Spawn the reaper. Wakes every `reclaim_after / 2`, floored at one second so a very small
/// `reclaim_after` configuration can't produce a busy loop.
pub fn spawn_reaper(
    pool: PgPool,
    reclaim_after: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let interval = (reclaim_after / 2).max(Duration::from_secs(1));
    let reclaim_after_chrono =
        ChronoDuration::from_std(reclaim_after).unwrap_or_else(|_| ChronoDuration::seconds(300));

    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(interval) => {
                    let now = chrono::Utc::now();
                    if let Err(e) = outbox_store::reap_stuck(&pool, now, reclaim_after_chrono).await {
                        error!("reaper sweep failed: {e}");
                    }
                }
            }
        }
    })
}
