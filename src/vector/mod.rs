//! C2: the per-model vector index (§4.2).

mod flat;
#[cfg(feature = "hnsw")]
mod hnsw;

pub use flat::FlatIndex;
#[cfg(feature = "hnsw")]
pub use hnsw::HnswIndex;

use async_trait::async_trait;

use crate::types::EntryId;
use crate::Result;

/// Distance metric an index (and the paired similarity evaluator) is
/// configured for. Fixed per model scope at `register` time (§4.2 invariant:
/// an index's metric never changes once entries exist).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// 1 - cosine similarity; lower is more similar.
    Cosine,
    /// Squared Euclidean distance; lower is more similar.
    L2,
}

/// A candidate returned by a nearest-neighbour search, before hydration.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: EntryId,
    /// Raw distance in the index's configured [`Metric`], not yet mapped to
    /// a similarity score (that mapping is [`crate::similarity::SimilarityEvaluator`]'s job).
    pub distance: f32,
}

/// Per-model approximate (or exact) nearest-neighbour index.
///
/// Every method is scoped by `model`: a flat backend keeps one vector set per
/// model, and an ANN backend keeps one sub-index per model. There is no
/// cross-model search.
#[async_trait]
pub trait VectorIndex: Send + Sync + 'static {
    /// Register a model scope with the index, fixing its dimensionality and
    /// metric. Idempotent: registering an already-known model is a no-op.
    async fn register(&self, model: &str, dimensions: usize, metric: Metric) -> Result<()>;

    /// Insert or overwrite the vector for `id` under `model`.
    async fn insert(&self, model: &str, id: EntryId, embedding: &[f32]) -> Result<()>;

    /// Return up to `top_k` nearest neighbours of `query`, closest first.
    /// An unregistered model returns an empty result, not an error (§4.2:
    /// querying a model with no entries yet is a miss, not a fault).
    async fn search(&self, model: &str, query: &[f32], top_k: usize) -> Result<Vec<VectorMatch>>;

    /// Remove a single entry's vector.
    async fn remove(&self, model: &str, id: EntryId) -> Result<()>;

    /// Drop every vector registered under `model`.
    async fn truncate(&self, model: &str) -> Result<()>;

    /// Flush any buffered state to durable storage. A no-op for the
    /// in-process backends (§9 Supplemented features: `flush`/`close`
    /// lifecycle hooks beyond the per-request operations).
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
