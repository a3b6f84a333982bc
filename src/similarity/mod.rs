//! C7: similarity evaluators (§4.7) — turn a vector index's raw distance
//! (plus, for some evaluators, the matched text) into a rank score on a
//! fixed `[min, max]` range that the adapter compares against its
//! similarity thresholds.

#[cfg(feature = "reranker")]
mod reranker;

#[cfg(feature = "reranker")]
pub use reranker::CrossEncoderReranker;

/// Scores how well a cached entry matches a query.
pub trait SimilarityEvaluator: Send + Sync + 'static {
    /// Rank a candidate. `distance` is the raw value the vector index
    /// returned for this candidate, in whatever metric the index was
    /// registered with.
    fn evaluate(&self, query_prompt: &str, cached_prompt: &str, distance: f32) -> f32;

    /// The inclusive `[min, max]` range `evaluate` can return. Thresholds
    /// configured as a fraction are scaled against this range (§5).
    fn range(&self) -> (f32, f32);
}

/// Cosine-metric evaluator: the index's `1 - cosine_similarity` distance is
/// inverted back to a similarity score directly, with no further mapping
/// ("direct threshold short-circuit", §4.7).
pub struct CosineEvaluator;

impl SimilarityEvaluator for CosineEvaluator {
    fn evaluate(&self, _query_prompt: &str, _cached_prompt: &str, distance: f32) -> f32 {
        (1.0 - distance).clamp(-1.0, 1.0)
    }

    fn range(&self) -> (f32, f32) {
        (-1.0, 1.0)
    }
}

/// L2-metric evaluator, ported from the reference `SearchDistanceEvaluation`:
/// clamp the raw distance to `[0, max_distance]`, then invert it so that
/// closer candidates score higher.
pub struct L2Evaluator {
    max_distance: f32,
}

impl L2Evaluator {
    pub fn new(max_distance: f32) -> Self {
        Self { max_distance }
    }
}

impl Default for L2Evaluator {
    fn default() -> Self {
        Self::new(4.0)
    }
}

impl SimilarityEvaluator for L2Evaluator {
    fn evaluate(&self, _query_prompt: &str, _cached_prompt: &str, distance: f32) -> f32 {
        let clamped = distance.clamp(0.0, self.max_distance);
        self.max_distance - clamped
    }

    fn range(&self) -> (f32, f32) {
        (0.0, self.max_distance)
    }
}

/// Exact-match evaluator, ported from the reference `ExactMatchEvaluation`:
/// ignores distance entirely and scores purely on literal prompt equality
/// (§4.7 "Supplemented features" — carried over from the original even
/// though the distilled spec doesn't name it).
pub struct ExactMatchEvaluator;

impl SimilarityEvaluator for ExactMatchEvaluator {
    fn evaluate(&self, query_prompt: &str, cached_prompt: &str, _distance: f32) -> f32 {
        if query_prompt == cached_prompt {
            1.0
        } else {
            0.0
        }
    }

    fn range(&self) -> (f32, f32) {
        (0.0, 1.0)
    }
}
