//! End-to-end tests against [`CacheEngine`] through the public
//! `CacheRequest`/`CacheResponse` envelope, with in-process default
//! backends (`FlatIndex`, `MemoryScalarStore`, `FsObjectStore`,
//! `MemoryTier`). No HTTP transport involved — see `src/server/mod.rs`'s
//! own tests for that layer.

use std::sync::Arc;

use async_trait::async_trait;

use modelcache::adapter::CacheEngine;
use modelcache::config::CacheEngineConfig;
use modelcache::embedding::{Embedder, EmbeddingDispatcher, EmbeddingDispatcherConfig};
use modelcache::manager::DataManager;
use modelcache::object_store::FsObjectStore;
use modelcache::scalar::MemoryScalarStore;
use modelcache::similarity::{CosineEvaluator, L2Evaluator};
use modelcache::tier::{EvictionPolicyKind, MemoryTier};
use modelcache::types::{AnswerInput, CacheRequest, ChatInfoPair, Prompt, RemoveType, Scope};
use modelcache::vector::FlatIndex;

/// Bag-of-words embedder: each whitespace-separated word is hashed into one
/// of `dims` buckets and counted, so prompts sharing words land close
/// together under cosine/L2 distance while unrelated prompts land far
/// apart. Deterministic and dependency-free, standing in for a real
/// embedding model the way the unit tests elsewhere in this crate do.
struct BagOfWordsEmbedder {
    dims: usize,
}

impl BagOfWordsEmbedder {
    fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl Embedder for BagOfWordsEmbedder {
    async fn embed(&self, text: &str) -> modelcache::Result<modelcache::types::Embedding> {
        let mut values = vec![0.0f32; self.dims];
        for word in text.split_whitespace() {
            let hash = word.bytes().fold(0u32, |acc, b| acc.wrapping_mul(131).wrapping_add(b as u32));
            values[(hash as usize) % self.dims] += 1.0;
        }
        Ok(modelcache::types::Embedding::new(values, "bow"))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "bow"
    }
}

/// An embedder whose output depends only on whether the text carries a
/// fixed marker, letting a test pin the exact distance between a stored
/// entry and every query that doesn't repeat the marker — used for the
/// short/long similarity-threshold boundary test, where the actual words
/// in the query are otherwise irrelevant.
struct AnchoredEmbedder;

#[async_trait]
impl Embedder for AnchoredEmbedder {
    async fn embed(&self, text: &str) -> modelcache::Result<modelcache::types::Embedding> {
        let values = if text.contains("ANCHOR_ZERO") {
            vec![0.0, 0.0]
        } else {
            vec![1.0, 0.0]
        };
        Ok(modelcache::types::Embedding::new(values, "anchored"))
    }

    fn dimensions(&self) -> usize {
        2
    }

    fn model_name(&self) -> &str {
        "anchored"
    }
}

async fn engine_with(
    embedder: impl Embedder,
    dims: usize,
    tier_capacity: usize,
) -> (CacheEngine, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let manager = Arc::new(DataManager::new(
        Arc::new(FlatIndex::new()),
        Arc::new(MemoryScalarStore::new()),
        Arc::new(FsObjectStore::new(dir.path())),
        Arc::new(MemoryTier::new(EvictionPolicyKind::Arc, tier_capacity)),
    ));
    let dispatcher =
        EmbeddingDispatcher::spawn(Arc::new(embedder), EmbeddingDispatcherConfig { queue_capacity: 32, workers: 2 });
    let mut config = CacheEngineConfig::default();
    config.embedding_dimensions = dims;
    config.metric = modelcache::config::MetricKind::L2;
    let engine = CacheEngine::new(dispatcher, manager, Arc::new(L2Evaluator::default()), config);
    (engine, dir)
}

/// Like [`engine_with`] but wired for the `#[default]` `Cosine` metric
/// instead of `L2`, with a configurable `similarity_threshold` — used to
/// exercise §4.7's cosine comparison (direct against `similarity_threshold`,
/// no `scale_threshold` range-rescaling) end-to-end, since every other
/// helper in this file forces `L2`.
async fn engine_with_cosine(
    embedder: impl Embedder,
    dims: usize,
    tier_capacity: usize,
    similarity_threshold: f32,
) -> (CacheEngine, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let manager = Arc::new(DataManager::new(
        Arc::new(FlatIndex::new()),
        Arc::new(MemoryScalarStore::new()),
        Arc::new(FsObjectStore::new(dir.path())),
        Arc::new(MemoryTier::new(EvictionPolicyKind::Arc, tier_capacity)),
    ));
    let dispatcher =
        EmbeddingDispatcher::spawn(Arc::new(embedder), EmbeddingDispatcherConfig { queue_capacity: 32, workers: 2 });
    let mut config = CacheEngineConfig::default();
    config.embedding_dimensions = dims;
    config.metric = modelcache::config::MetricKind::Cosine;
    config.similarity_threshold = similarity_threshold;
    config.similarity_threshold_long = similarity_threshold;
    let engine = CacheEngine::new(dispatcher, manager, Arc::new(CosineEvaluator), config);
    (engine, dir)
}

fn scope(model: &str) -> Scope {
    Scope { model: model.to_string() }
}

/// Scenario 1: registering a fresh model scope reports `create_success`;
/// registering it again reports `already_exists`.
#[tokio::test]
async fn register_then_reregister() {
    let (engine, _dir) = engine_with(BagOfWordsEmbedder::new(16), 16, 64).await;

    let first = engine.handle(CacheRequest::Register { scope: scope("m1") }).await;
    assert_eq!(first.error_code, 0);
    assert_eq!(first.response, Some(serde_json::Value::String("create_success".into())));

    let second = engine.handle(CacheRequest::Register { scope: scope("m1") }).await;
    assert_eq!(second.error_code, 0);
    assert_eq!(second.response, Some(serde_json::Value::String("already_exists".into())));
}

/// Scenario 2: inserting a `(prompt, answer)` pair into a registered scope
/// succeeds and the pair becomes retrievable by a later query.
#[tokio::test]
async fn insert_then_query_hits() {
    let (engine, _dir) = engine_with(BagOfWordsEmbedder::new(16), 16, 64).await;
    engine.handle(CacheRequest::Register { scope: scope("m1") }).await;

    let insert = engine
        .handle(CacheRequest::Insert {
            scope: scope("m1"),
            chat_info: vec![ChatInfoPair {
                query: Prompt::Plain("how do I open a file in rust".into()),
                answer: AnswerInput::Str("use std::fs::File::open".into()),
            }],
        })
        .await;
    assert_eq!(insert.error_code, 0);
    assert_eq!(insert.write_status.as_deref(), Some("success"));

    let hit = engine
        .handle(CacheRequest::Query {
            scope: scope("m1"),
            query: Prompt::Plain("how do I open a file in rust".into()),
            top_k: None,
            cache_factor: None,
        })
        .await;
    assert_eq!(hit.cache_hit, Some(true));
    assert_eq!(hit.answer.as_deref(), Some("use std::fs::File::open"));
}

/// Scenario 3: a query with no semantic overlap against anything cached
/// misses rather than returning an unrelated candidate.
#[tokio::test]
async fn unrelated_query_misses() {
    let (engine, _dir) = engine_with(BagOfWordsEmbedder::new(16), 16, 64).await;
    engine.handle(CacheRequest::Register { scope: scope("m1") }).await;
    engine
        .handle(CacheRequest::Insert {
            scope: scope("m1"),
            chat_info: vec![ChatInfoPair {
                query: Prompt::Plain("how do I open a file in rust".into()),
                answer: AnswerInput::Str("use std::fs::File::open".into()),
            }],
        })
        .await;

    let miss = engine
        .handle(CacheRequest::Query {
            scope: scope("m1"),
            query: Prompt::Plain("what's the capital of mongolia".into()),
            top_k: None,
            cache_factor: None,
        })
        .await;
    assert_eq!(miss.cache_hit, Some(false));
    assert!(miss.answer.is_none());
}

/// Scenario 4/5: deleting the entries behind a hit makes the same query
/// miss afterwards, and the response names both stores as having
/// succeeded.
#[tokio::test]
async fn delete_then_same_query_misses() {
    let (engine, _dir) = engine_with(BagOfWordsEmbedder::new(16), 16, 64).await;
    engine.handle(CacheRequest::Register { scope: scope("m1") }).await;
    engine
        .handle(CacheRequest::Insert {
            scope: scope("m1"),
            chat_info: vec![ChatInfoPair {
                query: Prompt::Plain("how do I open a file in rust".into()),
                answer: AnswerInput::Str("use std::fs::File::open".into()),
            }],
        })
        .await;

    let hit = engine
        .handle(CacheRequest::Query {
            scope: scope("m1"),
            query: Prompt::Plain("how do I open a file in rust".into()),
            top_k: None,
            cache_factor: None,
        })
        .await;
    assert_eq!(hit.cache_hit, Some(true));

    let remove = engine
        .handle(CacheRequest::Remove {
            scope: Some(scope("m1")),
            remove_type: RemoveType::TruncateByModel,
            id_list: None,
        })
        .await;
    assert_eq!(remove.error_code, 0);
    assert_eq!(remove.write_status.as_deref(), Some("success"));
    assert!(remove.response.is_none(), "an all-ok outcome carries no diagnostic payload");

    let miss = engine
        .handle(CacheRequest::Query {
            scope: scope("m1"),
            query: Prompt::Plain("how do I open a file in rust".into()),
            top_k: None,
            cache_factor: None,
        })
        .await;
    assert_eq!(miss.cache_hit, Some(false));
}

/// Scenario 6: once the in-memory tier has evicted an entry, a query that
/// lands on it still hits by falling back to the scalar store.
#[tokio::test]
async fn eviction_from_tier_still_resolves_via_scalar_store() {
    // Capacity 1: the second insert evicts the first from the tier, but not
    // from the scalar store or the vector index.
    let (engine, _dir) = engine_with(BagOfWordsEmbedder::new(16), 16, 1).await;
    engine.handle(CacheRequest::Register { scope: scope("m1") }).await;

    engine
        .handle(CacheRequest::Insert {
            scope: scope("m1"),
            chat_info: vec![ChatInfoPair {
                query: Prompt::Plain("how do I open a file in rust".into()),
                answer: AnswerInput::Str("use std::fs::File::open".into()),
            }],
        })
        .await;
    engine
        .handle(CacheRequest::Insert {
            scope: scope("m1"),
            chat_info: vec![ChatInfoPair {
                query: Prompt::Plain("how do I write a file in rust".into()),
                answer: AnswerInput::Str("use std::fs::write".into()),
            }],
        })
        .await;

    // The first entry was pushed out of the size-1 tier by the second
    // insert; it must still be found through the scalar store fallback.
    let hit = engine
        .handle(CacheRequest::Query {
            scope: scope("m1"),
            query: Prompt::Plain("how do I open a file in rust".into()),
            top_k: None,
            cache_factor: None,
        })
        .await;
    assert_eq!(hit.cache_hit, Some(true));
    assert_eq!(hit.answer.as_deref(), Some("use std::fs::File::open"));
}

/// §8 boundary behaviour: a query exactly at the 256-code-point threshold
/// uses the short-prompt similarity threshold; one code point longer uses
/// the relaxed long-prompt threshold. The anchored embedder pins the
/// distance between query and cached entry at exactly 1.0 regardless of
/// either string's content, so only the threshold selection can move the
/// hit/miss outcome.
#[tokio::test]
async fn prompt_length_boundary_selects_short_vs_long_threshold() {
    let (engine, _dir) = engine_with(AnchoredEmbedder, 2, 64).await;
    engine.handle(CacheRequest::Register { scope: scope("m1") }).await;
    engine
        .handle(CacheRequest::Insert {
            scope: scope("m1"),
            chat_info: vec![ChatInfoPair {
                query: Prompt::Plain("ANCHOR_ZERO".into()),
                answer: AnswerInput::Str("anchored answer".into()),
            }],
        })
        .await;

    let filler = |len: usize| "q".repeat(len);
    assert_eq!(filler(256).chars().count(), 256);
    assert_eq!(filler(257).chars().count(), 257);

    let at_threshold = engine
        .handle(CacheRequest::Query {
            scope: scope("m1"),
            query: Prompt::Plain(filler(256)),
            top_k: None,
            cache_factor: None,
        })
        .await;
    assert_eq!(at_threshold.cache_hit, Some(false), "256 code points still uses the stricter short threshold");

    let past_threshold = engine
        .handle(CacheRequest::Query {
            scope: scope("m1"),
            query: Prompt::Plain(filler(257)),
            top_k: None,
            cache_factor: None,
        })
        .await;
    assert_eq!(past_threshold.cache_hit, Some(true), "257 code points relaxes to the long threshold");
}

/// A request against an unregistered model is a miss, not a fault (§4.2).
#[tokio::test]
async fn query_against_never_registered_model_misses() {
    let (engine, _dir) = engine_with(BagOfWordsEmbedder::new(16), 16, 64).await;
    let resp = engine
        .handle(CacheRequest::Query {
            scope: scope("ghost"),
            query: Prompt::Plain("anything".into()),
            top_k: None,
            cache_factor: None,
        })
        .await;
    assert_eq!(resp.cache_hit, Some(false));
}

/// A blank query is rejected before it ever reaches the embedder.
#[tokio::test]
async fn empty_query_is_a_validation_error() {
    let (engine, _dir) = engine_with(BagOfWordsEmbedder::new(16), 16, 64).await;
    engine.handle(CacheRequest::Register { scope: scope("m1") }).await;
    let resp = engine
        .handle(CacheRequest::Query {
            scope: scope("m1"),
            query: Prompt::Plain("   ".into()),
            top_k: None,
            cache_factor: None,
        })
        .await;
    assert_ne!(resp.error_code, 0);
}

/// §4.7/§8 end-to-end: under the default `Cosine` metric, a candidate's
/// score is compared directly against `similarity_threshold` — it must not
/// be run through the `(max-min)*threshold*cache_factor` rescaling that
/// `L2` uses, since `CosineEvaluator::range()` is `(-1.0, 1.0)` and that
/// formula would double every configured threshold (clamping most of them
/// to 1.0, so only a bit-identical embedding could ever hit). A paraphrase
/// that shares most of its words with the cached prompt should still hit,
/// and a prompt sharing none of them should still miss.
#[tokio::test]
async fn cosine_metric_hits_on_paraphrase_and_misses_on_unrelated_prompt() {
    let (engine, _dir) = engine_with_cosine(BagOfWordsEmbedder::new(64), 64, 64, 0.9).await;
    engine.handle(CacheRequest::Register { scope: scope("m1") }).await;
    engine
        .handle(CacheRequest::Insert {
            scope: scope("m1"),
            chat_info: vec![ChatInfoPair {
                query: Prompt::Plain("how do I open a file in rust".into()),
                answer: AnswerInput::Str("use std::fs::File::open".into()),
            }],
        })
        .await;

    // Same words plus one extra: cosine similarity stays well above 0.9
    // (8 shared unit dims out of 9 total gives ~0.94), so this must hit
    // under a direct, unscaled comparison against `similarity_threshold`.
    let paraphrase = engine
        .handle(CacheRequest::Query {
            scope: scope("m1"),
            query: Prompt::Plain("how do I open a file in rust please".into()),
            top_k: None,
            cache_factor: None,
        })
        .await;
    assert_eq!(paraphrase.cache_hit, Some(true));
    assert_eq!(paraphrase.answer.as_deref(), Some("use std::fs::File::open"));

    // No shared words at all: cosine similarity is 0, well under 0.9.
    let unrelated = engine
        .handle(CacheRequest::Query {
            scope: scope("m1"),
            query: Prompt::Plain("completely different topic about gardening".into()),
            top_k: None,
            cache_factor: None,
        })
        .await;
    assert_eq!(unrelated.cache_hit, Some(false));
}

/// `cache_factor` still tightens/loosens the cosine threshold, even though
/// it skips the `(max-min)` range term L2 uses: a request-level
/// `cache_factor` above 1.0 multiplies `similarity_threshold` past what a
/// paraphrase that would otherwise hit can clear.
#[tokio::test]
async fn cache_factor_still_scales_the_cosine_threshold() {
    let (engine, _dir) = engine_with_cosine(BagOfWordsEmbedder::new(64), 64, 64, 0.9).await;
    engine.handle(CacheRequest::Register { scope: scope("m1") }).await;
    engine
        .handle(CacheRequest::Insert {
            scope: scope("m1"),
            chat_info: vec![ChatInfoPair {
                query: Prompt::Plain("how do I open a file in rust".into()),
                answer: AnswerInput::Str("use std::fs::File::open".into()),
            }],
        })
        .await;

    // Unscaled, this paraphrase clears 0.9 (see the test above). A
    // `cache_factor` of 1.2 pushes the effective threshold to 1.08, clamped
    // to cosine's max rank of 1.0 — above what any non-identical embedding
    // can reach, so the same query now misses.
    let tightened = engine
        .handle(CacheRequest::Query {
            scope: scope("m1"),
            query: Prompt::Plain("how do I open a file in rust please".into()),
            top_k: None,
            cache_factor: Some(1.2),
        })
        .await;
    assert_eq!(tightened.cache_hit, Some(false));
}
