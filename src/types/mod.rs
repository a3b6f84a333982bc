//! Wire and storage data types shared across the cache engine.

mod embedding;
mod entry;
mod prompt;
mod query_log;
mod request;

pub use embedding::Embedding;
pub use entry::{Answer, CacheEntry, EntryId, ObjectHandle};
pub use prompt::{ChatTurn, DependencyKind, Prompt, PromptDependency, Role};
pub use query_log::QueryLogEntry;
pub use request::{AnswerInput, CacheRequest, CacheResponse, ChatInfoPair, RemoveType, Scope};

/// Normalise a model name by replacing `-` and `.` with `_` (§3 invariant 5).
///
/// Applied exactly once, at request ingress; every downstream component
/// (vector index, scalar store, in-memory tier) partitions strictly on the
/// normalised form and never re-normalises.
pub fn normalize_model_name(model: &str) -> String {
    model.chars().map(|c| if c == '-' || c == '.' { '_' } else { c }).collect()
}

/// Whether `model` is safe to splice directly into a backend-specific
/// identifier (a SQL table name, a vector-index collection name, …).
///
/// §3 invariant 5 only promises `-`/`.` get folded into `_`; it says nothing
/// about every *other* character a client might send. A backend that builds
/// identifiers by string formatting (e.g. `scalar::sqlite`'s
/// `modelcache_entries_{model}`) must reject anything outside
/// `[A-Za-z0-9_]` before it ever reaches a query string, rather than trust
/// normalisation alone to have sanitised it.
pub fn is_safe_model_identifier(model: &str) -> bool {
    !model.is_empty() && model.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
