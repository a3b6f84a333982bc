//! Local embedding backend built on `fastembed`'s ONNX models.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use super::Embedder;
use crate::types::Embedding;
use crate::{CacheError, Result};

/// Runs a `fastembed::TextEmbedding` model on the blocking thread pool.
///
/// `TextEmbedding::embed` is synchronous and CPU-bound; every call is
/// dispatched through `spawn_blocking` so it never stalls the async runtime,
/// matching how the provider corpus wraps local ONNX inference.
pub struct FastEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    dimensions: usize,
}

impl FastEmbedder {
    pub fn try_new(model_name: impl Into<String>) -> Result<Self> {
        let model_name = model_name.into();
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::BGESmallENV15).with_show_download_progress(false),
        )
        .map_err(|e| CacheError::UnsupportedEmbeddingModel(format!("{model_name}: {e}")))?;
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_name,
            dimensions: 384,
        })
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();
        let model_name = self.model_name.clone();
        tokio::task::spawn_blocking(move || {
            let model = model
                .lock()
                .map_err(|_| CacheError::EmbedWorker("fastembed model lock poisoned".into()))?;
            let mut vectors = model
                .embed(vec![text], None)
                .map_err(|e| CacheError::EmbedWorker(e.to_string()))?;
            let values = vectors
                .pop()
                .ok_or_else(|| CacheError::EmbedWorker("fastembed returned no vectors".into()))?;
            Ok(Embedding::new(values, model_name))
        })
        .await
        .map_err(|e| CacheError::EmbedWorker(format!("blocking task panicked: {e}")))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
