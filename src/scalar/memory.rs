//! In-process [`ScalarStore`] backend. Always available (no feature gate);
//! the default when the `sqlite` feature is off, and useful in tests either
//! way since it needs no filesystem state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use super::ScalarStore;
use crate::types::{Answer, CacheEntry, EntryId, QueryLogEntry};
use crate::{CacheError, Result};

#[derive(Default)]
struct ModelTable {
    rows: HashMap<EntryId, CacheEntry>,
}

#[derive(Default)]
pub struct MemoryScalarStore {
    models: RwLock<HashMap<String, ModelTable>>,
    query_log: RwLock<Vec<QueryLogEntry>>,
    next_id: AtomicI64,
}

impl MemoryScalarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every logged query, oldest first. Test/inspection only.
    pub fn query_log_snapshot(&self) -> Vec<QueryLogEntry> {
        self.query_log.read().expect("query log lock poisoned").clone()
    }
}

#[async_trait]
impl ScalarStore for MemoryScalarStore {
    async fn register_model(&self, model: &str) -> Result<bool> {
        let mut models = self
            .models
            .write()
            .map_err(|_| CacheError::ScalarStoreFatal("memory store lock poisoned".into()))?;
        match models.entry(model.to_string()) {
            std::collections::hash_map::Entry::Occupied(_) => Ok(false),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(ModelTable::default());
                Ok(true)
            }
        }
    }

    async fn insert(
        &self,
        model: &str,
        prompt: &str,
        answer: &Answer,
        embedding: &[f32],
    ) -> Result<EntryId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut models = self
            .models
            .write()
            .map_err(|_| CacheError::ScalarStoreFatal("memory store lock poisoned".into()))?;
        let table = models
            .get_mut(model)
            .ok_or_else(|| CacheError::NoSuchIndex(model.to_string()))?;
        table.rows.insert(
            id,
            CacheEntry {
                id,
                prompt: prompt.to_string(),
                answer: answer.clone(),
                model: model.to_string(),
                embedding: embedding.to_vec(),
                hit_count: 0,
                deleted: false,
            },
        );
        Ok(id)
    }

    async fn get_many(&self, model: &str, ids: &[EntryId]) -> Result<Vec<CacheEntry>> {
        let models = self
            .models
            .read()
            .map_err(|_| CacheError::ScalarStoreFatal("memory store lock poisoned".into()))?;
        let Some(table) = models.get(model) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| table.rows.get(id))
            .filter(|e| !e.deleted)
            .cloned()
            .collect())
    }

    async fn soft_delete(&self, model: &str, ids: &[EntryId]) -> Result<()> {
        let mut models = self
            .models
            .write()
            .map_err(|_| CacheError::ScalarStoreFatal("memory store lock poisoned".into()))?;
        if let Some(table) = models.get_mut(model) {
            for id in ids {
                if let Some(row) = table.rows.get_mut(id) {
                    row.deleted = true;
                }
            }
        }
        Ok(())
    }

    async fn truncate(&self, model: &str) -> Result<()> {
        let mut models = self
            .models
            .write()
            .map_err(|_| CacheError::ScalarStoreFatal("memory store lock poisoned".into()))?;
        if let Some(table) = models.get_mut(model) {
            table.rows.clear();
        }
        Ok(())
    }

    async fn bump_hit_counts(&self, model: &str, ids: &[EntryId]) -> Result<()> {
        let mut models = self
            .models
            .write()
            .map_err(|_| CacheError::ScalarStoreFatal("memory store lock poisoned".into()))?;
        if let Some(table) = models.get_mut(model) {
            for id in ids {
                if let Some(row) = table.rows.get_mut(id) {
                    row.hit_count += 1;
                }
            }
        }
        Ok(())
    }

    async fn append_query_log(&self, entry: &QueryLogEntry) -> Result<()> {
        let mut log = self
            .query_log
            .write()
            .map_err(|_| CacheError::ScalarStoreFatal("memory store lock poisoned".into()))?;
        log.push(entry.clone());
        Ok(())
    }
}
