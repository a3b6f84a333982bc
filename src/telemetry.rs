//! Telemetry metric name constants.
//!
//! Centralised metric names for modelcache operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `modelcache_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `model` — the (normalised) model scope a request targets
//! - `operation` — `query` | `insert` | `remove` | `register`
//! - `status` — outcome: "ok" or "error"
//! - `policy` — eviction policy: "arc" | "w-tinylfu"

/// Total requests handled by the adapter.
///
/// Labels: `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "modelcache_requests_total";

/// Request duration in seconds.
///
/// Labels: `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "modelcache_request_duration_seconds";

/// Total cache hits on the similarity cache.
///
/// Labels: `model`.
pub const CACHE_HITS_TOTAL: &str = "modelcache_cache_hits_total";

/// Total cache misses on the similarity cache.
///
/// Labels: `model`.
pub const CACHE_MISSES_TOTAL: &str = "modelcache_cache_misses_total";

/// Total entries evicted from the in-memory tier.
///
/// Labels: `model`, `policy`.
pub const TIER_EVICTIONS_TOTAL: &str = "modelcache_tier_evictions_total";

/// Current number of live entries held in the in-memory tier.
///
/// Labels: `model`.
pub const TIER_SIZE: &str = "modelcache_tier_size";

/// Total embedding jobs dispatched to the worker pool.
///
/// Labels: `status` ("ok" | "error" | "cancelled").
pub const EMBED_JOBS_TOTAL: &str = "modelcache_embed_jobs_total";

/// Current depth of the embedding dispatcher's bounded job queue.
pub const EMBED_QUEUE_DEPTH: &str = "modelcache_embed_queue_depth";

/// Total scalar store round trips.
///
/// Labels: `op` ("batch_insert" | "get_by_id" | "mark_deleted" | "model_deleted" | "update_hit_count"), `status`.
pub const SCALAR_STORE_OPS_TOTAL: &str = "modelcache_scalar_store_ops_total";

/// Total vector index round trips.
///
/// Labels: `op` ("create" | "mul_add" | "search" | "delete" | "rebuild_col"), `status`.
pub const VECTOR_INDEX_OPS_TOTAL: &str = "modelcache_vector_index_ops_total";

/// Total background task failures (hit-count bump, query-log write), logged
/// and swallowed per the error-handling contract — never surfaced to callers.
///
/// Labels: `task` ("hit_count" | "query_log").
pub const BACKGROUND_TASK_FAILURES_TOTAL: &str = "modelcache_background_task_failures_total";
