//! Per-row dispatch: one transaction per row, sink call under a deadline, and the
//! success/retry/failure finalize decision.

use chrono::Utc;
use outbox_core::{OutboxRow, RetryConfig};
use outbox_sinks::{SinkError, SinkRegistry};
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error, info, warn};

pub async fn dispatch_row(
    pool: &PgPool,
    sinks: &SinkRegistry,
    retry_cfg: &RetryConfig,
    max_retries: i64,
    dispatch_timeout: Duration,
    row: OutboxRow,
) {
    let outcome = tokio::time::timeout(
        dispatch_timeout,
        sinks.dispatch(row.destination_type, &row.event_type, &row.payload),
    )
    .await;

    let result = match outcome {
        Ok(inner) => inner,
        Err(_) => Err(SinkError::Retryable("dispatch timed out".to_string())),
    };

    let mut txn = match pool.begin().await {
        Ok(txn) => txn,
        Err(e) => {
            error!(row_id = %row.id, "failed to open finalize transaction: {e}");
            return;
        }
    };

    let finalize_result = match result {
        Ok(()) => {
            info!(row_id = %row.id, "dispatch succeeded");
            outbox_store::finalize_success(&mut txn, row.id, Utc::now()).await
        }
        Err(SinkError::NonRetryable(msg)) => {
            warn!(row_id = %row.id, "dispatch non-retryable, failing row: {msg}");
            outbox_store::finalize_failure(&mut txn, row.id, &msg).await
        }
        Err(SinkError::Retryable(msg)) => {
            if row.attempt >= max_retries {
                warn!(row_id = %row.id, attempt = row.attempt, "attempts exhausted, failing row: {msg}");
                outbox_store::finalize_failure(&mut txn, row.id, &msg).await
            } else {
                let mut rng = rand::rng();
                match outbox_core::next_backoff(row.attempt, retry_cfg, &mut rng) {
                    Some(delay) => {
                        let next_execute_at = Utc::now()
                            + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
                        info!(row_id = %row.id, attempt = row.attempt, delay_ms = delay.as_millis(), "scheduling retry: {msg}");
                        outbox_store::finalize_retry(&mut txn, row.id, next_execute_at, &msg).await
                    }
                    None => {
                        warn!(row_id = %row.id, attempt = row.attempt, "backoff policy exhausted, failing row: {msg}");
                        outbox_store::finalize_failure(&mut txn, row.id, &msg).await
                    }
                }
            }
        }
    };

    match finalize_result {
        Ok(()) => {
            if let Err(e) = txn.commit().await {
                error!(row_id = %row.id, "finalize commit failed, row remains Processing: {e}");
            }
        }
        Err(e) => {
            error!(row_id = %row.id, "finalize failed, rolling back: {e}");
            let _ = txn.rollback().await;
        }
    }
}
