//! C6: the data manager (§4.6) — the only component that talks to more than
//! one backend trait at once, keeping the vector index, scalar store, and
//! in-memory tier consistent for a single model scope.

use std::sync::Arc;

use crate::object_store::ObjectStore;
use crate::scalar::ScalarStore;
use crate::tier::{MemoryTier, TierLookup};
use crate::types::{Answer, CacheEntry, EntryId, QueryLogEntry};
use crate::vector::{Metric, VectorIndex, VectorMatch};
use crate::Result;

/// Per-store success flags for a `delete` call (§7: partial-failure
/// reporting — names exactly which stores succeeded).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub scalar_ok: bool,
    pub vector_ok: bool,
}

impl DeleteOutcome {
    pub fn all_ok(&self) -> bool {
        self.scalar_ok && self.vector_ok
    }
}

/// Per-store success flags for a `truncate` call, same shape as
/// [`DeleteOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncateOutcome {
    pub scalar_ok: bool,
    pub vector_ok: bool,
}

impl TruncateOutcome {
    pub fn all_ok(&self) -> bool {
        self.scalar_ok && self.vector_ok
    }
}

/// Orchestrates C2 (vector index), C3 (scalar store), C4 (object store), and
/// C5 (in-memory tier) for a single cache engine instance.
///
/// Holds its backends as `Arc<dyn Trait>` rather than generics, matching
/// the provider corpus's preference for trait objects at composition
/// boundaries over monomorphising every call site.
pub struct DataManager {
    vector_index: Arc<dyn VectorIndex>,
    scalar_store: Arc<dyn ScalarStore>,
    object_store: Arc<dyn ObjectStore>,
    tier: Arc<MemoryTier>,
    /// Whether to L2-normalise embeddings before they touch the vector index
    /// or scalar store (§3 invariant 2, §4.6 steps 2/read-path). Fixed for
    /// the life of the manager.
    normalize: bool,
}

impl DataManager {
    pub fn new(
        vector_index: Arc<dyn VectorIndex>,
        scalar_store: Arc<dyn ScalarStore>,
        object_store: Arc<dyn ObjectStore>,
        tier: Arc<MemoryTier>,
    ) -> Self {
        Self::with_normalize(vector_index, scalar_store, object_store, tier, false)
    }

    pub fn with_normalize(
        vector_index: Arc<dyn VectorIndex>,
        scalar_store: Arc<dyn ScalarStore>,
        object_store: Arc<dyn ObjectStore>,
        tier: Arc<MemoryTier>,
        normalize: bool,
    ) -> Self {
        Self { vector_index, scalar_store, object_store, tier, normalize }
    }

    /// L2-normalise `embedding` in place when the manager is configured to
    /// (§3 invariant 2). A zero vector is left unchanged rather than
    /// producing `NaN`s.
    fn maybe_normalize(&self, embedding: &[f32]) -> std::borrow::Cow<'_, [f32]> {
        if !self.normalize {
            return std::borrow::Cow::Borrowed(embedding);
        }
        let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 {
            return std::borrow::Cow::Borrowed(embedding);
        }
        std::borrow::Cow::Owned(embedding.iter().map(|v| v / norm).collect())
    }

    /// Register a model scope with every backend that partitions by model.
    /// Idempotent; returns whether this call is the one that actually
    /// created the scope (the scalar store is the source of truth for this
    /// signal, since every backend is registered together and a scalar row
    /// is what every other path ultimately depends on).
    pub async fn register_model(&self, model: &str, dimensions: usize, metric: Metric) -> Result<bool> {
        let created = self.scalar_store.register_model(model).await?;
        self.vector_index.register(model, dimensions, metric).await?;
        Ok(created)
    }

    /// Persist a non-string answer through the object store, returning the
    /// handle-backed [`Answer`] to save alongside the entry.
    pub async fn store_answer_bytes(&self, bytes: &[u8], answer_type: &str) -> Result<Answer> {
        let handle = self.object_store.put(bytes).await?;
        Ok(Answer::Handle { handle, answer_type: answer_type.to_string() })
    }

    /// Save one `(prompt, answer)` pair: a scalar row first (so the id it
    /// mints is available), then the vector entry, then a warm copy in the
    /// tier. Order matters for consistency under crash: a scalar row
    /// without a vector entry is just unreachable via search (harmless); a
    /// vector entry without a scalar row would dangle.
    pub async fn save(
        &self,
        model: &str,
        prompt: &str,
        answer: Answer,
        embedding: &[f32],
    ) -> Result<EntryId> {
        let embedding = self.maybe_normalize(embedding);
        let embedding = embedding.as_ref();
        let id = self.scalar_store.insert(model, prompt, &answer, embedding).await?;
        self.vector_index.insert(model, id, embedding).await?;
        self.tier.insert(CacheEntry {
            id,
            prompt: prompt.to_string(),
            answer,
            model: model.to_string(),
            embedding: embedding.to_vec(),
            hit_count: 0,
            deleted: false,
        });
        metrics::counter!(crate::telemetry::SCALAR_STORE_OPS_TOTAL, "op" => "insert").increment(1);
        Ok(id)
    }

    /// Nearest-neighbour search against the vector index, unhydrated.
    /// Normalises `embedding` first when the manager is configured to, so a
    /// query vector is compared on the same footing as what's stored.
    pub async fn search(&self, model: &str, embedding: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        metrics::counter!(crate::telemetry::VECTOR_INDEX_OPS_TOTAL, "op" => "search").increment(1);
        let embedding = self.maybe_normalize(embedding);
        self.vector_index.search(model, &embedding, top_k).await
    }

    /// Hydrate candidate ids into full entries, preferring the in-memory
    /// tier and falling back to the scalar store for misses; entries
    /// fetched from the scalar store are warmed back into the tier.
    ///
    /// A ghost hit (id recently evicted from an ARC tier's `T1`/`T2`, still
    /// remembered in `B1`/`B2`) is tracked separately from a plain miss: the
    /// policy already adapted its state and consumed the ghost-list entry
    /// when `tier.get` ran, so the recovered value must be re-admitted via
    /// `insert_after_ghost_hit` to land with the frequency-favoured immunity
    /// a ghost hit earns (§4.5.1) — a plain `insert` would route it back
    /// into the single-access list as if it were never seen before.
    pub async fn hydrate(&self, model: &str, ids: &[EntryId]) -> Result<Vec<CacheEntry>> {
        let mut hydrated = Vec::with_capacity(ids.len());
        let mut misses = Vec::new();
        let mut ghost_hits = std::collections::HashSet::new();
        for &id in ids {
            match self.tier.get(model, id) {
                TierLookup::Hit(entry) => hydrated.push(entry),
                TierLookup::GhostHit => {
                    ghost_hits.insert(id);
                    misses.push(id);
                }
                TierLookup::Miss => misses.push(id),
            }
        }
        if !misses.is_empty() {
            let fetched = self.scalar_store.get_many(model, &misses).await?;
            for entry in fetched {
                if ghost_hits.contains(&entry.id) {
                    self.tier.insert_after_ghost_hit(entry.clone());
                } else {
                    self.tier.insert(entry.clone());
                }
                hydrated.push(entry);
            }
        }
        Ok(hydrated)
    }

    /// Soft-delete entries from the scalar store and drop their vector and
    /// tier entries. Never short-circuits on the first store failure (§7):
    /// every store is attempted and the outcome names which ones succeeded,
    /// so a vector-store outage doesn't hide a successful scalar delete.
    pub async fn delete(&self, model: &str, ids: &[EntryId]) -> Result<DeleteOutcome> {
        let scalar_ok = match self.scalar_store.soft_delete(model, ids).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(model, error = %err, "scalar soft-delete failed");
                false
            }
        };
        let mut vector_ok = true;
        for &id in ids {
            if let Err(err) = self.vector_index.remove(model, id).await {
                tracing::warn!(model, id, error = %err, "vector remove failed");
                vector_ok = false;
            }
            self.tier.remove(model, id);
        }
        Ok(DeleteOutcome { scalar_ok, vector_ok })
    }

    /// Drop every entry for `model` from every backend, same
    /// attempt-everything discipline as [`Self::delete`].
    pub async fn truncate(&self, model: &str) -> Result<TruncateOutcome> {
        let scalar_ok = match self.scalar_store.truncate(model).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(model, error = %err, "scalar truncate failed");
                false
            }
        };
        let vector_ok = match self.vector_index.truncate(model).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(model, error = %err, "vector truncate failed");
                false
            }
        };
        self.tier.truncate(model);
        Ok(TruncateOutcome { scalar_ok, vector_ok })
    }

    /// Best-effort hit-count bump (§8: never let a failure here fail the
    /// request that triggered it).
    pub async fn bump_hit_counts(&self, model: &str, ids: &[EntryId]) {
        if let Err(err) = self.scalar_store.bump_hit_counts(model, ids).await {
            metrics::counter!(crate::telemetry::BACKGROUND_TASK_FAILURES_TOTAL, "task" => "hit_count")
                .increment(1);
            tracing::warn!(model, ?ids, error = %err, "hit-count bump failed, ignoring");
        }
    }

    /// Append one row to the query log. Fire-and-forget (§3: never read by
    /// the core path, failures are logged and swallowed).
    pub async fn append_query_log(&self, entry: QueryLogEntry) {
        if let Err(err) = self.scalar_store.append_query_log(&entry).await {
            metrics::counter!(crate::telemetry::BACKGROUND_TASK_FAILURES_TOTAL, "task" => "query_log")
                .increment(1);
            tracing::warn!(error = %err, "query log append failed, ignoring");
        }
    }

    /// Flush the vector index and scalar store on graceful shutdown (§9
    /// Supplemented features). The in-memory tier has nothing durable to
    /// flush.
    pub async fn flush(&self) -> Result<()> {
        self.vector_index.flush().await?;
        self.scalar_store.flush().await?;
        Ok(())
    }
}
