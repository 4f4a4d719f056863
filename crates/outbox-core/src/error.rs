//! Error types for the outbox domain.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised while staging an event from the producer facade.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("event payload failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to insert outbox row: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors raised by the outbox store or the relay engine while operating on rows.
#[derive(Error, Debug)]
pub enum OutboxError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("row {0} is already in a terminal state")]
    AlreadyTerminal(Uuid),
}

/// Result type alias for outbox store operations.
pub type OutboxResult<T> = Result<T, OutboxError>;
