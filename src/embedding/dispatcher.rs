//! Bounded worker pool fanning embed requests out to an [`Embedder`] backend.
//!
//! Mirrors the provider backpressure pattern: a bounded mpsc queue caps how
//! far callers can get ahead of the backend, and a fixed pool of workers
//! pulls jobs off a shared receiver rather than spawning one task per call.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};

use super::Embedder;
use crate::types::Embedding;
use crate::{CacheError, Result};

/// Queue depth before `submit` starts waiting for a worker to free up.
const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Worker tasks pulling jobs off the shared queue.
const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct EmbeddingDispatcherConfig {
    pub queue_capacity: usize,
    pub workers: usize,
}

impl Default for EmbeddingDispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            workers: DEFAULT_WORKERS,
        }
    }
}

struct EmbedJob {
    text: String,
    reply: oneshot::Sender<Result<Embedding>>,
}

/// Handle to a running pool of embedding workers.
///
/// Cheap to clone: cloning shares the same queue and worker pool. Dropping
/// every clone closes the queue, which lets the worker tasks exit.
#[derive(Clone)]
pub struct EmbeddingDispatcher {
    tx: mpsc::Sender<EmbedJob>,
}

impl EmbeddingDispatcher {
    /// Spawn `config.workers` tasks pulling jobs from a queue of depth
    /// `config.queue_capacity`, all calling into `embedder`.
    pub fn spawn(embedder: Arc<dyn Embedder>, config: EmbeddingDispatcherConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..config.workers.max(1) {
            let rx = Arc::clone(&rx);
            let embedder = Arc::clone(&embedder);
            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(job) = job else {
                        tracing::debug!(worker_id, "embedding worker shutting down, queue closed");
                        break;
                    };
                    let result = embedder.embed(&job.text).await;
                    let status = if result.is_ok() { "ok" } else { "error" };
                    metrics::counter!(crate::telemetry::EMBED_JOBS_TOTAL, "status" => status).increment(1);
                    if result.is_err() {
                        tracing::warn!(worker_id, error = ?result.as_ref().err(), "embed job failed");
                    }
                    let _ = job.reply.send(result);
                }
            });
        }

        Self { tx }
    }

    /// Embed `text`, waiting for a worker to become available if the queue
    /// is saturated.
    pub async fn submit(&self, text: impl Into<String>) -> Result<Embedding> {
        let (reply, rx) = oneshot::channel();
        let job = EmbedJob { text: text.into(), reply };
        self.tx
            .send(job)
            .await
            .map_err(|_| CacheError::DispatcherStopped)?;
        metrics::gauge!(crate::telemetry::EMBED_QUEUE_DEPTH).set(self.tx.capacity() as f64);
        rx.await.map_err(|_| CacheError::DispatcherStopped)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoEmbedder;

    #[async_trait]
    impl Embedder for EchoEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding> {
            Ok(Embedding::new(vec![text.len() as f32], "echo"))
        }

        fn dimensions(&self) -> usize {
            1
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn submit_returns_embedding() {
        let dispatcher = EmbeddingDispatcher::spawn(
            Arc::new(EchoEmbedder),
            EmbeddingDispatcherConfig { queue_capacity: 4, workers: 2 },
        );
        let embedding = dispatcher.submit("hello").await.unwrap();
        assert_eq!(embedding.values, vec![5.0]);
    }

    #[tokio::test]
    async fn many_concurrent_submits_all_complete() {
        let dispatcher = EmbeddingDispatcher::spawn(
            Arc::new(EchoEmbedder),
            EmbeddingDispatcherConfig { queue_capacity: 4, workers: 3 },
        );
        let mut handles = Vec::new();
        for i in 0..20 {
            let dispatcher = dispatcher.clone();
            handles.push(tokio::spawn(async move {
                dispatcher.submit("x".repeat(i)).await.unwrap()
            }));
        }
        for (i, handle) in handles.into_iter().enumerate() {
            let embedding = handle.await.unwrap();
            assert_eq!(embedding.values, vec![i as f32]);
        }
    }
}
