//! The Producer Facade: the one function a business-transaction writer calls to enlist an
//! outbox row in its own transaction.
//!
//! Grounded in the source system's `CreateUser` use case, which opens one transaction,
//! writes its domain rows, builds an outbox row from the result, and inserts it through the
//! same transaction handle before a single commit/rollback decides the fate of both. This
//! facade is that same shape, stripped of any particular domain: callers open the
//! transaction, do their own writes, call `stage`, and commit.

use outbox_core::{NewEvent, StageError};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

/// Stage a new event for later delivery, as part of the caller's own transaction.
///
/// The row becomes durable only when the caller commits `txn`; a caller rollback leaves no
/// trace. Callers never pass their own transaction to the relay — `stage` is the only way
/// new outbox rows enter the table in this workspace.
pub async fn stage(txn: &mut Transaction<'_, Postgres>, event: NewEvent) -> Result<Uuid, StageError> {
    outbox_store::insert(txn, event)
        .await
        .map_err(|e| match e {
            outbox_core::OutboxError::Database(err) => StageError::Database(err),
            outbox_core::OutboxError::AlreadyTerminal(id) => {
                unreachable!("insert of a new row {id} cannot hit the terminal-state guard")
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbox_core::DestinationType;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test(migrations = "../../migrations")]
    async fn stage_then_commit_persists_a_pending_row(pool: PgPool) -> sqlx::Result<()> {
        let mut txn = pool.begin().await?;

        sqlx::query("INSERT INTO widgets (id, name) VALUES (gen_random_uuid(), $1)")
            .bind("cog")
            .execute(&mut *txn)
            .await?;

        let event = NewEvent::new(
            "widget.created",
            DestinationType::TaskQueue,
            json!({"name": "cog"}),
        )
        .unwrap();

        let id = stage(&mut txn, event).await.unwrap();
        txn.commit().await?;

        let row = outbox_store::find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(row.status, outbox_core::OutboxStatus::Pending);
        assert_eq!(row.attempt, 0);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn caller_rollback_leaves_no_outbox_row(pool: PgPool) -> sqlx::Result<()> {
        let mut txn = pool.begin().await?;

        let event = NewEvent::new(
            "widget.created",
            DestinationType::TaskQueue,
            json!({"name": "cog"}),
        )
        .unwrap();

        let id = stage(&mut txn, event).await.unwrap();
        txn.rollback().await?;

        let row = outbox_store::find_by_id(&pool, id).await.unwrap();
        assert!(row.is_none());
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn staged_row_defaults_execute_at_to_now(pool: PgPool) -> sqlx::Result<()> {
        let before = chrono::Utc::now();
        let mut txn = pool.begin().await?;

        let event = NewEvent::new("widget.created", DestinationType::TaskQueue, json!({})).unwrap();
        let id = stage(&mut txn, event).await.unwrap();
        txn.commit().await?;

        let row = outbox_store::find_by_id(&pool, id).await.unwrap().unwrap();
        assert!(row.execute_at >= before);
        Ok(())
    }
}
