//! The task-queue sink: submits each outbox row as a task over HTTP.
//!
//! The upstream system this was modeled on enqueues onto a Redis-backed task queue; this
//! workspace carries no Redis client, so the wire contract (task name, body, options) is
//! preserved but the transport is an HTTP POST via `reqwest`, which is already part of
//! this workspace's dependency set (see `DESIGN.md`).

use crate::{Sink, SinkError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// `sinks.task_queue.*` configuration (§6.2).
#[derive(Debug, Clone)]
pub struct TaskQueueSinkConfig {
    pub address: String,
    pub max_retries: u32,
}

impl TaskQueueSinkConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        use anyhow::Context;

        dotenvy::dotenv().ok();

        Ok(Self {
            address: std::env::var("TASK_QUEUE_ADDRESS")
                .context("TASK_QUEUE_ADDRESS must be set")?,
            max_retries: std::env::var("TASK_QUEUE_MAX_RETRIES")
                .ok()
                .map(|v| v.parse())
                .transpose()
                .context("TASK_QUEUE_MAX_RETRIES must be a valid integer")?
                .unwrap_or(3),
        })
    }
}

#[derive(Serialize)]
struct TaskOptions {
    max_retry: u32,
}

#[derive(Serialize)]
struct TaskSubmission<'a> {
    task: &'a str,
    payload: &'a serde_json::Value,
    options: TaskOptions,
}

/// Submits a task named by `event_type` with the row's raw payload to a configured HTTP
/// endpoint (§6.3).
pub struct HttpTaskQueueSink {
    client: reqwest::Client,
    config: TaskQueueSinkConfig,
}

impl HttpTaskQueueSink {
    #[must_use]
    pub fn new(config: TaskQueueSinkConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self { client, config }
    }
}

#[async_trait]
impl Sink for HttpTaskQueueSink {
    async fn enqueue(&self, event_type: &str, payload: &serde_json::Value) -> Result<(), SinkError> {
        let submission = TaskSubmission {
            task: event_type,
            payload,
            options: TaskOptions {
                max_retry: self.config.max_retries,
            },
        };

        let response = self
            .client
            .post(&self.config.address)
            .json(&submission)
            .send()
            .await
            .map_err(|e| SinkError::Retryable(format!("task queue transport error: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SinkError::Retryable(format!(
                "task queue rejected submission: status {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    async fn spawn_accepting_server(status_line: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                hits_clone.fetch_add(1, Ordering::SeqCst);
                use tokio::io::{AsyncReadExt, AsyncWriteExt};
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let body = format!("{status_line}\r\ncontent-length: 0\r\n\r\n");
                let _ = socket.write_all(body.as_bytes()).await;
            }
        });

        (format!("http://{addr}"), hits)
    }

    #[tokio::test]
    async fn successful_response_is_ok() {
        let (address, hits) = spawn_accepting_server("HTTP/1.1 200 OK").await;
        let sink = HttpTaskQueueSink::new(TaskQueueSinkConfig {
            address,
            max_retries: 3,
        });

        let result = sink
            .enqueue("email.verification.send", &serde_json::json!({"user_id": "u1"}))
            .await;

        assert!(result.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_success_status_is_retryable() {
        let (address, _hits) = spawn_accepting_server("HTTP/1.1 500 Internal Server Error").await;
        let sink = HttpTaskQueueSink::new(TaskQueueSinkConfig {
            address,
            max_retries: 3,
        });

        let err = sink
            .enqueue("email.verification.send", &serde_json::json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, SinkError::Retryable(_)));
    }

    #[tokio::test]
    async fn unreachable_address_is_retryable() {
        let sink = HttpTaskQueueSink::new(TaskQueueSinkConfig {
            address: "http://127.0.0.1:1".to_string(),
            max_retries: 3,
        });

        let err = sink
            .enqueue("email.verification.send", &serde_json::json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, SinkError::Retryable(_)));
    }
}
