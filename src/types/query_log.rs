//! Append-only query log rows (§3).

use serde::{Deserialize, Serialize};

/// One row appended to the scalar store's query log on every `query`
/// request. Append-only; never read by the core request path (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub error_code: u32,
    pub error_desc: String,
    pub cache_hit: bool,
    pub model: String,
    pub query: String,
    /// Wall-clock time the query took, formatted as the response envelope's
    /// `delta_time` field is (`"<seconds>s"`).
    pub delta_time: String,
    pub hit_query: String,
    pub answer: String,
}
