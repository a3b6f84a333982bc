//! Default brute-force [`VectorIndex`] backend: one vector set per model,
//! scanned in full on every search. Correct and simple; the `hnsw` feature
//! backend exists for deployments where a full scan is too slow.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{Metric, VectorIndex, VectorMatch};
use crate::types::EntryId;
use crate::{CacheError, Result};

struct ModelIndex {
    dimensions: usize,
    metric: Metric,
    vectors: HashMap<EntryId, Vec<f32>>,
}

fn distance(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Metric::L2 => a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum(),
        Metric::Cosine => {
            let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                1.0
            } else {
                1.0 - dot / (norm_a * norm_b)
            }
        }
    }
}

#[derive(Default)]
pub struct FlatIndex {
    models: RwLock<HashMap<String, ModelIndex>>,
}

impl FlatIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    async fn register(&self, model: &str, dimensions: usize, metric: Metric) -> Result<()> {
        if dimensions == 0 {
            return Err(CacheError::NonPositiveDimension(0));
        }
        let mut models = self
            .models
            .write()
            .map_err(|_| CacheError::VectorStoreFatal("flat index lock poisoned".into()))?;
        models.entry(model.to_string()).or_insert_with(|| ModelIndex {
            dimensions,
            metric,
            vectors: HashMap::new(),
        });
        Ok(())
    }

    async fn insert(&self, model: &str, id: EntryId, embedding: &[f32]) -> Result<()> {
        let mut models = self
            .models
            .write()
            .map_err(|_| CacheError::VectorStoreFatal("flat index lock poisoned".into()))?;
        let index = models
            .get_mut(model)
            .ok_or_else(|| CacheError::NoSuchIndex(model.to_string()))?;
        if embedding.len() != index.dimensions {
            return Err(CacheError::DimensionMismatch {
                expected: index.dimensions,
                actual: embedding.len(),
            });
        }
        index.vectors.insert(id, embedding.to_vec());
        Ok(())
    }

    async fn search(&self, model: &str, query: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        let models = self
            .models
            .read()
            .map_err(|_| CacheError::VectorStoreFatal("flat index lock poisoned".into()))?;
        let Some(index) = models.get(model) else {
            return Ok(Vec::new());
        };
        if query.len() != index.dimensions {
            return Err(CacheError::DimensionMismatch {
                expected: index.dimensions,
                actual: query.len(),
            });
        }
        let mut matches: Vec<VectorMatch> = index
            .vectors
            .iter()
            .map(|(&id, v)| VectorMatch { id, distance: distance(index.metric, query, v) })
            .collect();
        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn remove(&self, model: &str, id: EntryId) -> Result<()> {
        let mut models = self
            .models
            .write()
            .map_err(|_| CacheError::VectorStoreFatal("flat index lock poisoned".into()))?;
        if let Some(index) = models.get_mut(model) {
            index.vectors.remove(&id);
        }
        Ok(())
    }

    async fn truncate(&self, model: &str) -> Result<()> {
        let mut models = self
            .models
            .write()
            .map_err(|_| CacheError::VectorStoreFatal("flat index lock poisoned".into()))?;
        if let Some(index) = models.get_mut(model) {
            index.vectors.clear();
        }
        Ok(())
    }
}
