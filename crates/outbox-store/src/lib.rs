//! Typed Postgres access to the `outbox` table.
//!
//! Every operation here either runs inside a caller-supplied transaction (`insert`,
//! `claim_batch`, `mark_processing`, `finalize_*`) so that staging and claiming compose
//! with a caller's own business-transaction boundary, or runs directly against the pool
//! (`reap_stuck`, a maintenance sweep with no transactional partner).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use outbox_core::{DestinationType, NewEvent, OutboxError, OutboxResult, OutboxRow, OutboxStatus};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Insert a new row inside `txn`. On caller-commit the row is durable with
/// `status = Pending`, `attempt = 0`; on caller-rollback, nothing is persisted.
pub async fn insert(conn: &mut PgConnection, event: NewEvent) -> OutboxResult<Uuid> {
    let id = Uuid::new_v4();
    let execute_at = event.execute_at.unwrap_or_else(Utc::now);

    sqlx::query(
        r"
        INSERT INTO outbox (id, event_type, destination_type, payload, status, attempt, execute_at)
        VALUES ($1, $2, $3, $4, 'PENDING', 0, $5)
        ",
    )
    .bind(id)
    .bind(&event.event_type)
    .bind(event.destination_type)
    .bind(&event.payload)
    .bind(execute_at)
    .execute(conn)
    .await?;

    Ok(id)
}

/// Atomically select up to `limit` due rows and lock them against other claimants.
///
/// Two concurrent calls against an overlapping candidate set return disjoint rows: Postgres
/// `FOR UPDATE SKIP LOCKED` guarantees the union equals the candidate set and the
/// intersection is empty.
pub async fn claim_batch(
    txn: &mut Transaction<'_, Postgres>,
    now: DateTime<Utc>,
    limit: i64,
) -> OutboxResult<Vec<OutboxRow>> {
    if limit <= 0 {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, OutboxRow>(
        r"
        SELECT id, event_type, destination_type, payload, status, attempt,
               execute_at, sent_at, error_message, created_at, updated_at
        FROM outbox
        WHERE status IN ('PENDING', 'RETRYING') AND execute_at <= $1
        ORDER BY execute_at ASC
        LIMIT $2
        FOR UPDATE SKIP LOCKED
        ",
    )
    .bind(now)
    .bind(limit)
    .fetch_all(&mut **txn)
    .await?;

    Ok(rows)
}

/// Mark every row in `ids` as `Processing` and bump its `attempt` counter, in one
/// statement, inside the same transaction the batch was claimed in.
pub async fn mark_processing(txn: &mut Transaction<'_, Postgres>, ids: &[Uuid]) -> OutboxResult<()> {
    if ids.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r"
        UPDATE outbox
        SET status = 'PROCESSING', attempt = attempt + 1, updated_at = now()
        WHERE id = ANY($1) AND status NOT IN ('SENT', 'FAILED')
        ",
    )
    .bind(ids)
    .execute(&mut **txn)
    .await?;

    Ok(())
}

/// Transition a row to `Sent`. No-ops on a row that is already terminal — the claim
/// protocol makes this unreachable, but the guard is kept defensively.
pub async fn finalize_success(
    txn: &mut Transaction<'_, Postgres>,
    id: Uuid,
    sent_at: DateTime<Utc>,
) -> OutboxResult<()> {
    sqlx::query(
        r"
        UPDATE outbox
        SET status = 'SENT', sent_at = $2, updated_at = now()
        WHERE id = $1 AND status NOT IN ('SENT', 'FAILED')
        ",
    )
    .bind(id)
    .bind(sent_at)
    .execute(&mut **txn)
    .await?;

    Ok(())
}

/// Transition a row to `Retrying`, rescheduling it for `next_execute_at`.
pub async fn finalize_retry(
    txn: &mut Transaction<'_, Postgres>,
    id: Uuid,
    next_execute_at: DateTime<Utc>,
    err: &str,
) -> OutboxResult<()> {
    sqlx::query(
        r"
        UPDATE outbox
        SET status = 'RETRYING', execute_at = $2, error_message = $3, updated_at = now()
        WHERE id = $1 AND status NOT IN ('SENT', 'FAILED')
        ",
    )
    .bind(id)
    .bind(next_execute_at)
    .bind(err)
    .execute(&mut **txn)
    .await?;

    Ok(())
}

/// Transition a row to `Failed` — terminal, attempts exhausted (or an unrecoverable
/// dispatch error such as an unknown destination).
pub async fn finalize_failure(
    txn: &mut Transaction<'_, Postgres>,
    id: Uuid,
    err: &str,
) -> OutboxResult<()> {
    sqlx::query(
        r"
        UPDATE outbox
        SET status = 'FAILED', error_message = $2, updated_at = now()
        WHERE id = $1 AND status NOT IN ('SENT', 'FAILED')
        ",
    )
    .bind(id)
    .bind(err)
    .execute(&mut **txn)
    .await?;

    Ok(())
}

/// Sweep rows stuck in `Processing` past `reclaim_after` and demote them back to
/// `Retrying` so they re-enter the claim set. Returns the number of rows reclaimed.
///
/// This is the hardening addition over the source system: nothing in the original
/// implementation recovers a row left in `Processing` by a crash between commit and
/// dispatch-finalize. Without this sweep, such rows are stuck forever.
pub async fn reap_stuck(
    pool: &PgPool,
    now: DateTime<Utc>,
    reclaim_after: ChronoDuration,
) -> OutboxResult<u64> {
    let threshold = now - reclaim_after;

    let result = sqlx::query(
        r"
        UPDATE outbox
        SET status = 'RETRYING', execute_at = $1, updated_at = $1
        WHERE status = 'PROCESSING' AND updated_at < $2
        ",
    )
    .bind(now)
    .bind(threshold)
    .execute(pool)
    .await
    .map_err(OutboxError::Database)?;

    let reclaimed = result.rows_affected();
    if reclaimed > 0 {
        tracing::warn!(reclaimed, "reaper demoted stuck PROCESSING rows to RETRYING");
    }

    Ok(reclaimed)
}

/// Fetch a single row by id — used by tests and operational inspection.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> OutboxResult<Option<OutboxRow>> {
    let row = sqlx::query_as::<_, OutboxRow>(
        r"
        SELECT id, event_type, destination_type, payload, status, attempt,
               execute_at, sent_at, error_message, created_at, updated_at
        FROM outbox
        WHERE id = $1
        ",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Count rows currently eligible for claim — used for status logging.
pub async fn count_due(pool: &PgPool, now: DateTime<Utc>) -> OutboxResult<i64> {
    let count: i64 = sqlx::query_scalar(
        r"
        SELECT count(*) FROM outbox
        WHERE status IN ('PENDING', 'RETRYING') AND execute_at <= $1
        ",
    )
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
