//! The persisted outbox row and the types staged events are built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row in the `outbox` table.
///
/// Ownership is exclusively the database's: this struct is a short-lived, per-attempt
/// snapshot. It is authoritative only for the duration of one claim or one dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutboxRow {
    pub id: Uuid,
    pub event_type: String,
    pub destination_type: DestinationType,
    #[sqlx(json)]
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub attempt: i64,
    pub execute_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle status of an outbox row.
///
/// `Sent` and `Failed` are terminal: a row in either state is never reclaimed by a claim
/// or by the reaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum OutboxStatus {
    Pending,
    Processing,
    Sent,
    Failed,
    Retrying,
}

impl OutboxStatus {
    /// `true` for `Sent` and `Failed` — states the claim protocol and the reaper must
    /// never touch again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

/// Destination a row's payload is ultimately delivered to.
///
/// `StreamA` and `StreamB` are accepted at the schema and producer level today (a caller may
/// stage an event against either) even though no sink is registered for them yet in
/// `outbox-sinks` — dispatching to them currently resolves to the unknown-destination path
/// until a stream sink is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DestinationType {
    TaskQueue,
    StreamA,
    StreamB,
}

/// Input to the producer facade's `stage` operation.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: String,
    pub destination_type: DestinationType,
    pub payload: serde_json::Value,
    /// Earliest time this event becomes eligible for claim. Defaults to "now" if `None`.
    pub execute_at: Option<DateTime<Utc>>,
}

impl NewEvent {
    /// Build a `NewEvent` whose payload is serialized from any `Serialize` value.
    ///
    /// Returns an error if `payload` doesn't round-trip through `serde_json` — this is the
    /// one way a caller can fail to stage an event, and it fails at the producer, never in
    /// the relay.
    pub fn new(
        event_type: impl Into<String>,
        destination_type: DestinationType,
        payload: impl Serialize,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type: event_type.into(),
            destination_type,
            payload: serde_json::to_value(payload)?,
            execute_at: None,
        })
    }

    #[must_use]
    pub const fn execute_at(mut self, at: DateTime<Utc>) -> Self {
        self.execute_at = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(OutboxStatus::Sent.is_terminal());
        assert!(OutboxStatus::Failed.is_terminal());
        assert!(!OutboxStatus::Pending.is_terminal());
        assert!(!OutboxStatus::Processing.is_terminal());
        assert!(!OutboxStatus::Retrying.is_terminal());
    }

    #[test]
    fn new_event_carries_serialized_payload() {
        #[derive(Serialize)]
        struct Payload {
            user_id: String,
        }

        let event = NewEvent::new(
            "email.verification.send",
            DestinationType::TaskQueue,
            Payload {
                user_id: "u1".into(),
            },
        )
        .expect("payload serializes");

        assert_eq!(event.payload["user_id"], "u1");
        assert!(event.execute_at.is_none());
    }
}
