//! The Sink Dispatcher: a capability trait, a lookup table keyed by `DestinationType`, and
//! the task-queue sink implementation.
//!
//! New destinations are added by implementing [`Sink`] and registering it in a
//! [`SinkRegistry`] — never by branching on destination type deeper in the relay.

mod task_queue;

use async_trait::async_trait;
use outbox_core::DestinationType;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub use task_queue::{HttpTaskQueueSink, TaskQueueSinkConfig};

/// Outcome of a failed dispatch. The distinction drives whether the relay retries or
/// fails the row immediately (§4.5, §7).
#[derive(Error, Debug)]
pub enum SinkError {
    /// Transport error, timeout, or a rejection the sink may accept on a later attempt.
    #[error("{0}")]
    Retryable(String),
    /// The destination is not one this process can deliver to — e.g. no sink registered
    /// for it. Bypasses the retry policy: the relay transitions the row straight to
    /// `Failed`.
    #[error("{0}")]
    NonRetryable(String),
}

/// A destination capable of accepting an outbox row's payload.
///
/// The relay never inspects `payload` — it is forwarded verbatim to whichever sink is
/// registered for the row's `destination_type`.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn enqueue(&self, event_type: &str, payload: &serde_json::Value) -> Result<(), SinkError>;
}

/// Lookup table from `destination_type` to the sink that delivers to it.
///
/// Built once at startup and shared (via `Arc`) across every relay driver in the process.
#[derive(Clone, Default)]
pub struct SinkRegistry {
    sinks: HashMap<DestinationType, Arc<dyn Sink>>,
}

impl SinkRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn register(mut self, destination_type: DestinationType, sink: Arc<dyn Sink>) -> Self {
        self.sinks.insert(destination_type, sink);
        self
    }

    /// Forward a payload to whichever sink is registered for `destination_type`.
    ///
    /// An unregistered destination is a non-retryable error — the "Unknown destination"
    /// edge case from §4.5/§8: it causes an immediate `Failed` transition regardless of
    /// how many attempts remain.
    pub async fn dispatch(
        &self,
        destination_type: DestinationType,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<(), SinkError> {
        match self.sinks.get(&destination_type) {
            Some(sink) => sink.enqueue(event_type, payload).await,
            None => Err(SinkError::NonRetryable(format!(
                "no sink registered for destination {destination_type:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        calls: AtomicUsize,
        fail_first_n: usize,
    }

    #[async_trait]
    impl Sink for CountingSink {
        async fn enqueue(&self, _event_type: &str, _payload: &serde_json::Value) -> Result<(), SinkError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first_n {
                Err(SinkError::Retryable("simulated failure".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn dispatch_to_unregistered_destination_is_non_retryable() {
        let registry = SinkRegistry::new();
        let err = registry
            .dispatch(DestinationType::StreamA, "e", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::NonRetryable(_)));
    }

    #[tokio::test]
    async fn dispatch_to_unregistered_destination_fails_on_first_call() {
        // Exercise that the unknown-destination path never even consults the sink table
        // beyond a lookup miss — it can't have "used up" an attempt budget.
        let registry = SinkRegistry::new();
        for _ in 0..3 {
            let err = registry
                .dispatch(DestinationType::StreamB, "e", &serde_json::json!({}))
                .await
                .unwrap_err();
            assert!(matches!(err, SinkError::NonRetryable(_)));
        }
    }

    #[tokio::test]
    async fn dispatch_forwards_to_registered_sink() {
        let sink = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
            fail_first_n: 0,
        });
        let registry = SinkRegistry::new().register(DestinationType::TaskQueue, sink.clone());

        registry
            .dispatch(DestinationType::TaskQueue, "widget.created", &serde_json::json!({"id": 1}))
            .await
            .unwrap();

        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retryable_error_is_distinguished_from_non_retryable() {
        let sink = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
            fail_first_n: 1,
        });
        let registry = SinkRegistry::new().register(DestinationType::TaskQueue, sink);

        let err = registry
            .dispatch(DestinationType::TaskQueue, "e", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Retryable(_)));
    }
}
