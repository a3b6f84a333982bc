//! C9: the adapter (§4.9) — the request state machine tying every other
//! component together behind the [`CacheRequest`]/[`CacheResponse`]
//! envelope.

use std::sync::Arc;
use std::time::Instant;

use crate::config::CacheEngineConfig;
use crate::embedding::EmbeddingDispatcher;
use crate::manager::DataManager;
use crate::processing::{self, PreProcessor};
use crate::similarity::SimilarityEvaluator;
use crate::types::{
    is_safe_model_identifier, normalize_model_name, Answer, AnswerInput, CacheRequest,
    CacheResponse, EntryId, Prompt, QueryLogEntry, RemoveType,
};
use crate::vector::Metric;
use crate::{CacheError, Result};

/// Everything a request needs to run, passed explicitly rather than
/// resolved through a hidden global (§9 Design Notes: no ambient `cache`
/// singleton, state flows through an explicit handle).
pub struct CacheEngine {
    embedder: EmbeddingDispatcher,
    manager: Arc<DataManager>,
    evaluator: Arc<dyn SimilarityEvaluator>,
    pre_processor: PreProcessor,
    metric: Metric,
    config: CacheEngineConfig,
}

#[derive(Clone)]
struct RankedCandidate {
    rank: f32,
    id: EntryId,
    question: String,
    answer: String,
}

impl CacheEngine {
    pub fn new(
        embedder: EmbeddingDispatcher,
        manager: Arc<DataManager>,
        evaluator: Arc<dyn SimilarityEvaluator>,
        config: CacheEngineConfig,
    ) -> Self {
        let pre_processor = config.pre_processor.into();
        let metric = config.metric.into();
        Self { embedder, manager, evaluator, pre_processor, metric, config }
    }

    /// Dispatch one request, never propagating an error out: every failure
    /// is mapped to a [`CacheResponse`] carrying the matching error code
    /// (§6), so a transport layer never needs its own error-to-wire mapping.
    pub async fn handle(&self, request: CacheRequest) -> CacheResponse {
        let operation = match &request {
            CacheRequest::Query { .. } => "query",
            CacheRequest::Insert { .. } => "insert",
            CacheRequest::Remove { .. } => "remove",
            CacheRequest::Register { .. } => "register",
        };
        let result = match request {
            CacheRequest::Query { scope, query, top_k, cache_factor } => {
                self.query(&scope.model, query, top_k, cache_factor).await
            }
            CacheRequest::Insert { scope, chat_info } => self.insert(&scope.model, chat_info).await,
            CacheRequest::Remove { scope, remove_type, id_list } => {
                self.remove(scope.map(|s| s.model), remove_type, id_list).await
            }
            CacheRequest::Register { scope } => self.register(&scope.model).await,
        };
        let response = match result {
            Ok(response) => {
                metrics::counter!(crate::telemetry::REQUESTS_TOTAL, "operation" => operation, "status" => "ok")
                    .increment(1);
                response
            }
            Err(err) => {
                tracing::warn!(error = %err, "request failed");
                metrics::counter!(crate::telemetry::REQUESTS_TOTAL, "operation" => operation, "status" => "error")
                    .increment(1);
                CacheResponse::from_error(&err)
            }
        };
        response
    }

    fn check_model(&self, model: &str) -> Result<String> {
        let normalized = normalize_model_name(model);
        if !is_safe_model_identifier(&normalized) {
            return Err(CacheError::Validation(format!(
                "model scope '{model}' contains characters other than letters, digits, '-', '.', '_'"
            )));
        }
        if self.config.model_blacklist.contains(&normalized) {
            return Err(CacheError::ModelBlacklisted(normalized));
        }
        Ok(normalized)
    }

    async fn register(&self, model: &str) -> Result<CacheResponse> {
        let model = self.check_model(model)?;
        let created = self
            .manager
            .register_model(&model, self.config.embedding_dimensions, self.metric)
            .await?;
        let response = if created { "create_success" } else { "already_exists" };
        Ok(CacheResponse {
            write_status: Some("success".to_string()),
            response: Some(serde_json::Value::String(response.to_string())),
            ..CacheResponse::ok()
        })
    }

    async fn query(
        &self,
        model: &str,
        query: Prompt,
        top_k: Option<i64>,
        cache_factor: Option<f32>,
    ) -> Result<CacheResponse> {
        let start = Instant::now();
        let model = self.check_model(model)?;
        let text = self.pre_processor.apply(&query);
        if text.trim().is_empty() {
            return Err(CacheError::EmptyInput);
        }
        let cache_factor = cache_factor.unwrap_or(1.0);
        let top_k = top_k.filter(|&k| k > 0).unwrap_or(self.config.default_top_k).max(1) as usize;

        let embedding = self.embedder.submit(text.clone()).await?;
        let candidates = self.manager.search(&model, &embedding.values, top_k).await?;

        // §4.7: the `(max-min)*threshold*cache_factor` rank-scaling formula
        // is an L2-only construction — for cosine, a candidate's score is
        // compared directly against `similarity_threshold`. Applying the L2
        // scaling to cosine's `[-1, 1]` range would double every configured
        // threshold (and clamp most of them to 1.0, rejecting everything but
        // a near-identical embedding), so the two metrics branch here rather
        // than sharing one formula. `cache_factor` still applies to both —
        // it's a per-request loosen/tighten knob independent of the metric,
        // just without the `(max-min)` range term cosine doesn't use.
        let is_long = text.chars().count() > crate::config::LONG_PROMPT_THRESHOLD;
        let threshold_fraction =
            if is_long { self.config.similarity_threshold_long } else { self.config.similarity_threshold };
        let (min_rank, max_rank) = self.evaluator.range();
        let threshold = match self.metric {
            Metric::L2 => scale_threshold(min_rank, max_rank, threshold_fraction, cache_factor),
            Metric::Cosine => (threshold_fraction * cache_factor).clamp(min_rank, max_rank),
        };

        let response = if candidates.is_empty() {
            metrics::counter!(crate::telemetry::CACHE_MISSES_TOTAL, "model" => model.clone()).increment(1);
            CacheResponse { cache_hit: Some(false), delta_time: Some(format_delta(start)), ..CacheResponse::ok() }
        } else {
            let top_rank = self.evaluator.evaluate(&text, &text, candidates[0].distance);
            if top_rank < threshold {
                metrics::counter!(crate::telemetry::CACHE_MISSES_TOTAL, "model" => model.clone()).increment(1);
                CacheResponse {
                    cache_hit: Some(false),
                    delta_time: Some(format_delta(start)),
                    ..CacheResponse::ok()
                }
            } else {
                let ids: Vec<EntryId> = candidates.iter().map(|c| c.id).collect();
                let hydrated = self.manager.hydrate(&model, &ids).await?;
                let mut ranked: Vec<RankedCandidate> = candidates
                    .iter()
                    .filter_map(|candidate| {
                        let entry = hydrated.iter().find(|e| e.id == candidate.id)?;
                        let rank = self.evaluator.evaluate(&text, &entry.prompt, candidate.distance);
                        if rank < threshold {
                            return None;
                        }
                        Some(RankedCandidate {
                            rank,
                            id: entry.id,
                            question: entry.prompt.clone(),
                            answer: entry.answer.as_str().unwrap_or_default().to_string(),
                        })
                    })
                    .collect();
                ranked.sort_by(|a, b| b.rank.total_cmp(&a.rank));

                if let Some(best) = processing::first(&ranked) {
                    metrics::counter!(crate::telemetry::CACHE_HITS_TOTAL, "model" => model.clone()).increment(1);
                    let hit_ids: Vec<EntryId> = ranked.iter().map(|c| c.id).collect();
                    let manager = Arc::clone(&self.manager);
                    let model_for_bump = model.clone();
                    tokio::spawn(async move {
                        manager.bump_hit_counts(&model_for_bump, &hit_ids).await;
                    });
                    CacheResponse {
                        cache_hit: Some(true),
                        delta_time: Some(format_delta(start)),
                        hit_query: Some(best.question.clone()),
                        answer: Some(best.answer.clone()),
                        ..CacheResponse::ok()
                    }
                } else {
                    metrics::counter!(crate::telemetry::CACHE_MISSES_TOTAL, "model" => model.clone()).increment(1);
                    CacheResponse {
                        cache_hit: Some(false),
                        delta_time: Some(format_delta(start)),
                        ..CacheResponse::ok()
                    }
                }
            }
        };

        let manager = Arc::clone(&self.manager);
        let log_entry = QueryLogEntry {
            error_code: response.error_code,
            error_desc: response.error_desc.clone(),
            cache_hit: response.cache_hit.unwrap_or(false),
            model: model.clone(),
            query: text.clone(),
            delta_time: response.delta_time.clone().unwrap_or_default(),
            hit_query: response.hit_query.clone().unwrap_or_default(),
            answer: response.answer.clone().unwrap_or_default(),
        };
        tokio::spawn(async move {
            manager.append_query_log(log_entry).await;
        });

        Ok(response)
    }

    async fn insert(&self, model: &str, chat_info: Vec<crate::types::ChatInfoPair>) -> Result<CacheResponse> {
        let model = self.check_model(model)?;
        if chat_info.is_empty() {
            return Err(CacheError::Validation("chat_info must not be empty".into()));
        }

        // PRE_PROCESS(all pairs), resolving each answer's storage up front so
        // the only thing left in the embed stage is pure text -> vector work.
        let mut texts = Vec::with_capacity(chat_info.len());
        let mut answers = Vec::with_capacity(chat_info.len());
        for pair in chat_info {
            let text = self.pre_processor.apply(&pair.query);
            if text.trim().is_empty() {
                return Err(CacheError::EmptyInput);
            }
            let answer = match pair.answer {
                AnswerInput::Str(s) => Answer::Str(s),
                AnswerInput::Typed { bytes, answer_type } => {
                    self.manager.store_answer_bytes(&bytes, &answer_type).await?
                }
            };
            texts.push(text);
            answers.push(answer);
        }

        // EMBED(batched, gathered): fan every pair out to the dispatcher
        // concurrently rather than awaiting one at a time, so a pool of N
        // workers actually embeds up to N pairs in parallel (§4.1, §9).
        let embeddings = futures_util::future::try_join_all(
            texts.iter().map(|text| self.embedder.submit(text.clone())),
        )
        .await?;

        // SAVE(C6.import_data): scalar-first per pair, in submission order.
        for ((text, answer), embedding) in texts.into_iter().zip(answers).zip(embeddings) {
            self.manager.save(&model, &text, answer, &embedding.values).await?;
        }
        Ok(CacheResponse { write_status: Some("success".to_string()), ..CacheResponse::ok() })
    }

    async fn remove(
        &self,
        model: Option<String>,
        remove_type: RemoveType,
        id_list: Option<Vec<EntryId>>,
    ) -> Result<CacheResponse> {
        let (all_ok, outcome) = match remove_type {
            RemoveType::DeleteById => {
                let model = model.ok_or(CacheError::MissingField("scope"))?;
                let model = self.check_model(&model)?;
                let ids = id_list.ok_or(CacheError::MissingField("id_list"))?;
                let outcome = self.manager.delete(&model, &ids).await?;
                (
                    outcome.all_ok(),
                    serde_json::json!({"scalar_ok": outcome.scalar_ok, "vector_ok": outcome.vector_ok}),
                )
            }
            RemoveType::TruncateByModel => {
                let model = model.ok_or(CacheError::MissingField("scope"))?;
                let model = self.check_model(&model)?;
                let outcome = self.manager.truncate(&model).await?;
                (
                    outcome.all_ok(),
                    serde_json::json!({"scalar_ok": outcome.scalar_ok, "vector_ok": outcome.vector_ok}),
                )
            }
        };
        Ok(CacheResponse {
            write_status: Some(if all_ok { "success".to_string() } else { "exception".to_string() }),
            response: if all_ok { None } else { Some(outcome) },
            ..CacheResponse::ok()
        })
    }
}

fn scale_threshold(min_rank: f32, max_rank: f32, threshold_fraction: f32, cache_factor: f32) -> f32 {
    let raw = (max_rank - min_rank) * threshold_fraction * cache_factor;
    raw.clamp(min_rank, max_rank)
}

fn format_delta(start: Instant) -> String {
    format!("{:.4}s", start.elapsed().as_secs_f64())
}
