//! C3: the scalar store (§4.3) — durable entries plus the append-only query log.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryScalarStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteScalarStore;

use async_trait::async_trait;

use crate::types::{Answer, CacheEntry, EntryId, QueryLogEntry};
use crate::Result;

/// Durable store of cache entries and the query log, partitioned by model.
///
/// Deletes are soft (§3 invariant: a deleted row's id is never reused and
/// its vector is dropped from the index, but the row itself stays for
/// audit); `truncate` is the one operation that actually drops rows.
#[async_trait]
pub trait ScalarStore: Send + Sync + 'static {
    /// Ensure a model's backing table/partition exists. Idempotent: returns
    /// `Ok(true)` the first time a model is registered and `Ok(false)` on
    /// every subsequent call, so the adapter can distinguish a fresh
    /// registration from a re-registration (§8 end-to-end scenario 1:
    /// `create_success` vs. `already_exists`).
    async fn register_model(&self, model: &str) -> Result<bool>;

    /// Insert a new entry and return the id the store assigned it.
    async fn insert(
        &self,
        model: &str,
        prompt: &str,
        answer: &Answer,
        embedding: &[f32],
    ) -> Result<EntryId>;

    /// Fetch the entries for `ids`, in arbitrary order; ids with no live row
    /// (never existed, soft-deleted, or from another model) are omitted.
    async fn get_many(&self, model: &str, ids: &[EntryId]) -> Result<Vec<CacheEntry>>;

    /// Soft-delete the given ids: the row is marked deleted and excluded
    /// from all future reads, but not physically removed.
    async fn soft_delete(&self, model: &str, ids: &[EntryId]) -> Result<()>;

    /// Physically drop every row for `model`, live or soft-deleted.
    async fn truncate(&self, model: &str) -> Result<()>;

    /// Best-effort hit-count increment for the given ids (§8: a failure here
    /// must never fail the request it was triggered by).
    async fn bump_hit_counts(&self, model: &str, ids: &[EntryId]) -> Result<()>;

    /// Append one row to the query log. Fire-and-forget from the adapter's
    /// point of view; failures are logged, never surfaced.
    async fn append_query_log(&self, entry: &QueryLogEntry) -> Result<()>;

    /// Flush any buffered state to durable storage. A no-op for the
    /// in-memory backend; the SQLite backend's connection pool already
    /// commits every statement, so this is a no-op there too (§9
    /// Supplemented features).
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
