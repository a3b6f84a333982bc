//! Optional approximate [`VectorIndex`] backend using `hnsw_rs`.
//!
//! `hnsw_rs` has no delete operation, so removed ids are tombstoned and
//! filtered out of search results rather than actually removed from the
//! underlying graph; `truncate` drops the whole per-model index and starts
//! a fresh one rather than trying to compact it.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use hnsw_rs::dist::{DistCosine, DistL2};
use hnsw_rs::hnsw::Hnsw;

use super::{Metric, VectorIndex, VectorMatch};
use crate::types::EntryId;
use crate::{CacheError, Result};

const MAX_NB_CONNECTION: usize = 16;
const MAX_ELEMENTS: usize = 1_000_000;
const MAX_LAYER: usize = 16;
const EF_CONSTRUCTION: usize = 200;
const EF_SEARCH: usize = 64;

enum Graph {
    L2(Hnsw<'static, f32, DistL2>),
    Cosine(Hnsw<'static, f32, DistCosine>),
}

struct ModelHnsw {
    dimensions: usize,
    graph: Graph,
    /// `hnsw_rs` ids are dense `usize`s assigned on insert; map back to the
    /// scalar store's [`EntryId`].
    id_to_entry: HashMap<usize, EntryId>,
    entry_to_id: HashMap<EntryId, usize>,
    tombstoned: HashSet<usize>,
    next_id: usize,
}

impl ModelHnsw {
    fn new(dimensions: usize, metric: Metric) -> Self {
        let graph = match metric {
            Metric::L2 => Graph::L2(Hnsw::new(
                MAX_NB_CONNECTION,
                MAX_ELEMENTS,
                MAX_LAYER,
                EF_CONSTRUCTION,
                DistL2 {},
            )),
            Metric::Cosine => Graph::Cosine(Hnsw::new(
                MAX_NB_CONNECTION,
                MAX_ELEMENTS,
                MAX_LAYER,
                EF_CONSTRUCTION,
                DistCosine {},
            )),
        };
        Self {
            dimensions,
            graph,
            id_to_entry: HashMap::new(),
            entry_to_id: HashMap::new(),
            tombstoned: HashSet::new(),
            next_id: 0,
        }
    }

    fn insert(&mut self, id: EntryId, embedding: &[f32]) {
        if let Some(&existing) = self.entry_to_id.get(&id) {
            self.tombstoned.insert(existing);
        }
        let hnsw_id = self.next_id;
        self.next_id += 1;
        match &mut self.graph {
            Graph::L2(h) => h.insert((embedding, hnsw_id)),
            Graph::Cosine(h) => h.insert((embedding, hnsw_id)),
        }
        self.id_to_entry.insert(hnsw_id, id);
        self.entry_to_id.insert(id, hnsw_id);
    }

    fn search(&self, query: &[f32], top_k: usize) -> Vec<VectorMatch> {
        // Over-fetch to absorb tombstoned hits before truncating to `top_k`.
        let fetch = (top_k + self.tombstoned.len()).max(top_k) * 2 + 8;
        let neighbours = match &self.graph {
            Graph::L2(h) => h.search(query, fetch, EF_SEARCH),
            Graph::Cosine(h) => h.search(query, fetch, EF_SEARCH),
        };
        let mut matches = Vec::with_capacity(top_k);
        for n in neighbours {
            if self.tombstoned.contains(&n.d_id) {
                continue;
            }
            let Some(&entry_id) = self.id_to_entry.get(&n.d_id) else {
                continue;
            };
            matches.push(VectorMatch { id: entry_id, distance: n.distance });
            if matches.len() == top_k {
                break;
            }
        }
        matches
    }

    fn remove(&mut self, id: EntryId) {
        if let Some(&hnsw_id) = self.entry_to_id.get(&id) {
            self.tombstoned.insert(hnsw_id);
        }
    }
}

#[derive(Default)]
pub struct HnswIndex {
    models: RwLock<HashMap<String, ModelHnsw>>,
}

impl HnswIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for HnswIndex {
    async fn register(&self, model: &str, dimensions: usize, metric: Metric) -> Result<()> {
        if dimensions == 0 {
            return Err(CacheError::NonPositiveDimension(0));
        }
        let mut models = self
            .models
            .write()
            .map_err(|_| CacheError::VectorStoreFatal("hnsw index lock poisoned".into()))?;
        models
            .entry(model.to_string())
            .or_insert_with(|| ModelHnsw::new(dimensions, metric));
        Ok(())
    }

    async fn insert(&self, model: &str, id: EntryId, embedding: &[f32]) -> Result<()> {
        let mut models = self
            .models
            .write()
            .map_err(|_| CacheError::VectorStoreFatal("hnsw index lock poisoned".into()))?;
        let index = models
            .get_mut(model)
            .ok_or_else(|| CacheError::NoSuchIndex(model.to_string()))?;
        if embedding.len() != index.dimensions {
            return Err(CacheError::DimensionMismatch {
                expected: index.dimensions,
                actual: embedding.len(),
            });
        }
        index.insert(id, embedding);
        Ok(())
    }

    async fn search(&self, model: &str, query: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        let models = self
            .models
            .read()
            .map_err(|_| CacheError::VectorStoreFatal("hnsw index lock poisoned".into()))?;
        let Some(index) = models.get(model) else {
            return Ok(Vec::new());
        };
        if query.len() != index.dimensions {
            return Err(CacheError::DimensionMismatch {
                expected: index.dimensions,
                actual: query.len(),
            });
        }
        Ok(index.search(query, top_k))
    }

    async fn remove(&self, model: &str, id: EntryId) -> Result<()> {
        let mut models = self
            .models
            .write()
            .map_err(|_| CacheError::VectorStoreFatal("hnsw index lock poisoned".into()))?;
        if let Some(index) = models.get_mut(model) {
            index.remove(id);
        }
        Ok(())
    }

    async fn truncate(&self, model: &str) -> Result<()> {
        let mut models = self
            .models
            .write()
            .map_err(|_| CacheError::VectorStoreFatal("hnsw index lock poisoned".into()))?;
        if let Some(index) = models.get(model) {
            let dimensions = index.dimensions;
            let metric = match index.graph {
                Graph::L2(_) => Metric::L2,
                Graph::Cosine(_) => Metric::Cosine,
            };
            models.insert(model.to_string(), ModelHnsw::new(dimensions, metric));
        }
        Ok(())
    }
}
