//! Default durable [`ScalarStore`] backend: one SQLite table per model plus
//! a shared query log table, via `sqlx`'s async SQLite driver.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use super::ScalarStore;
use crate::types::{is_safe_model_identifier, Answer, CacheEntry, EntryId, ObjectHandle, QueryLogEntry};
use crate::{CacheError, Result};

/// Build the per-model table identifier, rejecting anything that isn't
/// `[A-Za-z0-9_]`. The adapter already normalises and validates model names
/// at request ingress (`adapter::CacheEngine::check_model`), but this is the
/// actual trust boundary: nothing reaches a dynamically-built SQL statement
/// here without passing this check first, regardless of caller.
fn entries_table(model: &str) -> Result<String> {
    if !is_safe_model_identifier(model) {
        return Err(CacheError::Validation(format!(
            "model '{model}' is not a valid SQL identifier (expected [A-Za-z0-9_]+)"
        )));
    }
    Ok(format!("modelcache_entries_{model}"))
}

fn transient(e: sqlx::Error) -> CacheError {
    CacheError::ScalarStoreTransient(e.to_string())
}

fn fatal(e: sqlx::Error) -> CacheError {
    CacheError::ScalarStoreFatal(e.to_string())
}

pub struct SqliteScalarStore {
    pool: SqlitePool,
}

impl SqliteScalarStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await
            .map_err(fatal)?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS modelcache_querylog (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                error_code INTEGER NOT NULL,
                error_desc TEXT NOT NULL,
                cache_hit INTEGER NOT NULL,
                model TEXT NOT NULL,
                query TEXT NOT NULL,
                delta_time TEXT NOT NULL,
                hit_query TEXT NOT NULL,
                answer TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(fatal)?;
        Ok(Self { pool })
    }

    fn row_to_entry(model: &str, row: &sqlx::sqlite::SqliteRow) -> Result<CacheEntry> {
        let answer_type: String = row.try_get("answer_type").map_err(fatal)?;
        let answer_str: Option<String> = row.try_get("answer_str").map_err(fatal)?;
        let answer = if answer_type == "str" {
            Answer::Str(answer_str.unwrap_or_default())
        } else {
            Answer::Handle {
                handle: ObjectHandle::new(answer_str.unwrap_or_default()),
                answer_type,
            }
        };
        let embedding_bytes: Vec<u8> = row.try_get("embedding").map_err(fatal)?;
        Ok(CacheEntry {
            id: row.try_get("id").map_err(fatal)?,
            prompt: row.try_get("prompt").map_err(fatal)?,
            answer,
            model: model.to_string(),
            embedding: CacheEntry::embedding_from_bytes(&embedding_bytes),
            hit_count: row.try_get::<i64, _>("hit_count").map_err(fatal)? as u64,
            deleted: row.try_get::<i64, _>("deleted").map_err(fatal)? != 0,
        })
    }
}

#[async_trait]
impl ScalarStore for SqliteScalarStore {
    async fn register_model(&self, model: &str) -> Result<bool> {
        let table = entries_table(model)?;
        let existing: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(&table)
                .fetch_optional(&self.pool)
                .await
                .map_err(transient)?;
        if existing.is_some() {
            return Ok(false);
        }
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                prompt TEXT NOT NULL,
                answer_type TEXT NOT NULL,
                answer_str TEXT,
                embedding BLOB NOT NULL,
                hit_count INTEGER NOT NULL DEFAULT 0,
                deleted INTEGER NOT NULL DEFAULT 0
            )"
        );
        sqlx::query(&sql).execute(&self.pool).await.map_err(transient)?;
        Ok(true)
    }

    async fn insert(
        &self,
        model: &str,
        prompt: &str,
        answer: &Answer,
        embedding: &[f32],
    ) -> Result<EntryId> {
        let table = entries_table(model)?;
        let answer_str = answer.as_str().map(str::to_string).or_else(|| match answer {
            Answer::Handle { handle, .. } => Some(handle.as_str().to_string()),
            Answer::Str(_) => None,
        });
        let bytes: Vec<u8> = embedding.iter().flat_map(|v| v.to_le_bytes()).collect();
        let sql = format!(
            "INSERT INTO {table} (prompt, answer_type, answer_str, embedding) VALUES (?, ?, ?, ?)"
        );
        let result = sqlx::query(&sql)
            .bind(prompt)
            .bind(answer.answer_type())
            .bind(answer_str)
            .bind(bytes)
            .execute(&self.pool)
            .await
            .map_err(transient)?;
        Ok(result.last_insert_rowid())
    }

    async fn get_many(&self, model: &str, ids: &[EntryId]) -> Result<Vec<CacheEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let table = entries_table(model)?;
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT id, prompt, answer_type, answer_str, embedding, hit_count, deleted
             FROM {table} WHERE deleted = 0 AND id IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(transient)?;
        rows.iter().map(|r| Self::row_to_entry(model, r)).collect()
    }

    async fn soft_delete(&self, model: &str, ids: &[EntryId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let table = entries_table(model)?;
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "UPDATE {table} SET deleted = 1, updated_at = CURRENT_TIMESTAMP WHERE id IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        query.execute(&self.pool).await.map_err(transient)?;
        Ok(())
    }

    async fn truncate(&self, model: &str) -> Result<()> {
        let table = entries_table(model)?;
        let sql = format!("DELETE FROM {table}");
        sqlx::query(&sql).execute(&self.pool).await.map_err(transient)?;
        Ok(())
    }

    async fn bump_hit_counts(&self, model: &str, ids: &[EntryId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let table = entries_table(model)?;
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "UPDATE {table} SET hit_count = hit_count + 1, updated_at = CURRENT_TIMESTAMP WHERE id IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        query.execute(&self.pool).await.map_err(transient)?;
        Ok(())
    }

    async fn append_query_log(&self, entry: &QueryLogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO modelcache_querylog
             (error_code, error_desc, cache_hit, model, query, delta_time, hit_query, answer)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.error_code)
        .bind(&entry.error_desc)
        .bind(entry.cache_hit)
        .bind(&entry.model)
        .bind(&entry.query)
        .bind(&entry.delta_time)
        .bind(&entry.hit_query)
        .bind(&entry.answer)
        .execute(&self.pool)
        .await
        .map_err(transient)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteScalarStore {
        SqliteScalarStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn insert_then_get_roundtrips() {
        let store = store().await;
        store.register_model("m").await.unwrap();
        let id = store
            .insert("m", "hello", &Answer::Str("hi".into()), &[1.0, -2.0])
            .await
            .unwrap();
        let rows = store.get_many("m", &[id]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].prompt, "hello");
        assert_eq!(rows[0].embedding, vec![1.0, -2.0]);
    }

    #[tokio::test]
    async fn soft_delete_excludes_row() {
        let store = store().await;
        store.register_model("m").await.unwrap();
        let id = store
            .insert("m", "hello", &Answer::Str("hi".into()), &[1.0])
            .await
            .unwrap();
        store.soft_delete("m", &[id]).await.unwrap();
        assert!(store.get_many("m", &[id]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn model_name_with_unsafe_characters_is_rejected_not_interpolated() {
        let store = store().await;
        let err = store
            .register_model("m\" ; DROP TABLE modelcache_querylog; --")
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Validation(_)));
        let err = store.insert("a.b", "p", &Answer::Str("a".into()), &[1.0]).await.unwrap_err();
        assert!(matches!(err, CacheError::Validation(_)));
    }

    #[tokio::test]
    async fn query_log_append_succeeds() {
        let store = store().await;
        store
            .append_query_log(&QueryLogEntry {
                error_code: 0,
                error_desc: String::new(),
                cache_hit: true,
                model: "m".into(),
                query: "hi".into(),
                delta_time: "0.01s".into(),
                hit_query: "hi".into(),
                answer: "hello".into(),
            })
            .await
            .unwrap();
    }
}
