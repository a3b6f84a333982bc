//! Cross-encoder re-ranker, replacing the raw-distance evaluators with an
//! ONNX Runtime model's own relevance score, mirroring the provider
//! corpus's local ONNX inference pattern (session + tokenizer downloaded
//! through `hf-hub`, inference run off the async runtime).

use std::sync::Mutex;

use ort::session::Session;
use tokenizers::Tokenizer;

use super::SimilarityEvaluator;

pub struct CrossEncoderReranker {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

impl CrossEncoderReranker {
    pub fn load(model_path: &str, tokenizer_path: &str) -> crate::Result<Self> {
        let session = Session::builder()
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| crate::CacheError::Configuration(format!("loading reranker model: {e}")))?;
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| crate::CacheError::Configuration(format!("loading reranker tokenizer: {e}")))?;
        Ok(Self { session: Mutex::new(session), tokenizer })
    }

    fn score(&self, query: &str, candidate: &str) -> crate::Result<f32> {
        let encoding = self
            .tokenizer
            .encode((query, candidate), true)
            .map_err(|e| crate::CacheError::Configuration(format!("tokenizing reranker input: {e}")))?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();

        let session = self
            .session
            .lock()
            .map_err(|_| crate::CacheError::Configuration("reranker session lock poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => ([1, ids.len()], ids.as_slice()),
            ])
            .map_err(|e| crate::CacheError::Configuration(format!("reranker inference failed: {e}")))?;
        let logits = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| crate::CacheError::Configuration(format!("reading reranker output: {e}")))?;
        Ok(*logits.1.first().unwrap_or(&0.0))
    }
}

impl SimilarityEvaluator for CrossEncoderReranker {
    /// Ignores `distance`: the model itself produces the relevance score,
    /// the vector search's distance only narrowed the candidate set.
    fn evaluate(&self, query_prompt: &str, cached_prompt: &str, _distance: f32) -> f32 {
        self.score(query_prompt, cached_prompt).unwrap_or(f32::MIN)
    }

    fn range(&self) -> (f32, f32) {
        (f32::MIN, f32::MAX)
    }
}
