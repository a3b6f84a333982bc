//! Cache engine configuration.
//!
//! Mirrors the teacher daemon's layered config: a [`CacheEngineConfig`]
//! constructible directly in code (the common case for embedding this crate
//! into another service), with an optional TOML-file loading path under the
//! `server` feature for the standalone `cached` daemon.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::processing::PreProcessor;
use crate::vector::Metric;

/// Default rank-threshold fraction applied to a short query (§5).
const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.8;
/// Default rank-threshold fraction applied to a query longer than 256 code
/// points (§5) — the reference implementation relaxes the bar slightly for
/// longer prompts, where embeddings are noisier.
const DEFAULT_SIMILARITY_THRESHOLD_LONG: f32 = 0.7;
/// Query length, in code points, above which the "long" threshold applies.
pub const LONG_PROMPT_THRESHOLD: usize = 256;
const DEFAULT_TOP_K: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheEngineConfig {
    pub similarity_threshold: f32,
    pub similarity_threshold_long: f32,
    pub default_top_k: i64,
    #[serde(default)]
    pub pre_processor: PreProcessorKind,
    #[serde(default)]
    pub metric: MetricKind,
    pub embedding_dimensions: usize,
    /// Whether embeddings are L2-normalised before being stored or searched
    /// (§3 invariant 2). Fixed per engine instance — the reference
    /// implementation picks this per embedding model (e.g. `false` for a
    /// cosine-tuned model already producing near-unit vectors, `true` for an
    /// L2-metric model where normalisation keeps distances comparable).
    #[serde(default)]
    pub normalize: bool,
    #[serde(default)]
    pub model_blacklist: HashSet<String>,
    #[serde(default = "default_embed_queue_capacity")]
    pub embed_queue_capacity: usize,
    #[serde(default = "default_embed_workers")]
    pub embed_workers: usize,
    #[serde(default = "default_tier_capacity")]
    pub tier_capacity_per_model: usize,
}

fn default_embed_queue_capacity() -> usize {
    256
}

fn default_embed_workers() -> usize {
    4
}

fn default_tier_capacity() -> usize {
    10_000
}

/// Serde-friendly mirror of [`PreProcessor`] (kept separate so the engine's
/// internal enum doesn't need to grow `Serialize`/`Deserialize` impls just
/// to satisfy config loading).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreProcessorKind {
    #[default]
    LastContent,
    RoleAndLastContent,
    AllContent,
    MultiSplicing,
}

impl From<PreProcessorKind> for PreProcessor {
    fn from(kind: PreProcessorKind) -> Self {
        match kind {
            PreProcessorKind::LastContent => PreProcessor::LastContent,
            PreProcessorKind::RoleAndLastContent => PreProcessor::RoleAndLastContent,
            PreProcessorKind::AllContent => PreProcessor::AllContent,
            PreProcessorKind::MultiSplicing => PreProcessor::MultiSplicing,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
    #[default]
    Cosine,
    L2,
}

impl From<MetricKind> for Metric {
    fn from(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Cosine => Metric::Cosine,
            MetricKind::L2 => Metric::L2,
        }
    }
}

impl Default for CacheEngineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            similarity_threshold_long: DEFAULT_SIMILARITY_THRESHOLD_LONG,
            default_top_k: DEFAULT_TOP_K,
            pre_processor: PreProcessorKind::default(),
            metric: MetricKind::default(),
            embedding_dimensions: 384,
            normalize: false,
            model_blacklist: HashSet::new(),
            embed_queue_capacity: default_embed_queue_capacity(),
            embed_workers: default_embed_workers(),
            tier_capacity_per_model: default_tier_capacity(),
        }
    }
}

#[cfg(feature = "server")]
impl CacheEngineConfig {
    /// Load from a TOML file, falling back to defaults for any field the
    /// file omits. Mirrors the daemon config's "file overrides defaults,
    /// nothing else in the chain" resolution order — there is no
    /// environment-variable layer here since the values aren't secrets.
    pub fn from_toml_str(contents: &str) -> crate::Result<Self> {
        toml::from_str(contents)
            .map_err(|e| crate::CacheError::Configuration(format!("parsing config TOML: {e}")))
    }
}
