//! libSQL backend — async `DocumentStore` implementation.
//!
//! Stores one JSON document per user in a single table. Supports local file
//! and in-memory databases; merge-writes are read-merge-upsert under the
//! single reused connection.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::traits::{DocumentStore, merge_documents};

/// libSQL document store.
///
/// Holds a single connection reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlDocumentStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlDocumentStore {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Open(format!("Failed to create store directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "Document store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS user_documents (
                    user_id TEXT PRIMARY KEY,
                    doc TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )",
                (),
            )
            .await
            .map_err(|e| StoreError::Query(format!("init_schema: {e}")))?;
        Ok(())
    }

    async fn read_raw(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT doc FROM user_documents WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("read: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row.get::<String>(0).map_err(|e| {
                StoreError::Query(format!("read column: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("read: {e}"))),
        }
    }
}

#[async_trait]
impl DocumentStore for LibSqlDocumentStore {
    async fn write(&self, user_id: &str, document: &Value, merge: bool) -> Result<(), StoreError> {
        let merged = if merge {
            match self.read_raw(user_id).await? {
                Some(existing_text) => {
                    let mut existing: Value = serde_json::from_str(&existing_text)
                        .map_err(|e| StoreError::Serialization(format!("stored doc: {e}")))?;
                    merge_documents(&mut existing, document);
                    existing
                }
                None => document.clone(),
            }
        } else {
            document.clone()
        };

        let doc_text = serde_json::to_string(&merged)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                "INSERT INTO user_documents (user_id, doc, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET doc = excluded.doc, updated_at = excluded.updated_at",
                params![user_id, doc_text, now],
            )
            .await
            .map_err(|e| StoreError::Query(format!("write: {e}")))?;

        debug!(user_id, merge, "Document written");
        Ok(())
    }

    async fn read(&self, user_id: &str) -> Result<Option<Value>, StoreError> {
        match self.read_raw(user_id).await? {
            Some(text) => {
                let value = serde_json::from_str(&text)
                    .map_err(|e| StoreError::Serialization(format!("stored doc: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let store = LibSqlDocumentStore::new_memory().await.unwrap();
        let doc = json!({"cognitive_profile": {"is_final": true}});
        store.write("u1", &doc, false).await.unwrap();
        assert_eq!(store.read("u1").await.unwrap().unwrap(), doc);
    }

    #[tokio::test]
    async fn read_absent_user_is_none() {
        let store = LibSqlDocumentStore::new_memory().await.unwrap();
        assert!(store.read("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn merge_write_preserves_existing_fields() {
        let store = LibSqlDocumentStore::new_memory().await.unwrap();
        store
            .write("u1", &json!({"profile": {"a": 1}, "keep": true}), true)
            .await
            .unwrap();
        store
            .write("u1", &json!({"profile": {"b": 2}}), true)
            .await
            .unwrap();

        let doc = store.read("u1").await.unwrap().unwrap();
        assert_eq!(doc["keep"], true);
        assert_eq!(doc["profile"], json!({"a": 1, "b": 2}));
    }

    #[tokio::test]
    async fn replace_write_discards_existing_fields() {
        let store = LibSqlDocumentStore::new_memory().await.unwrap();
        store.write("u1", &json!({"old": 1}), false).await.unwrap();
        store.write("u1", &json!({"new": 2}), false).await.unwrap();
        assert_eq!(store.read("u1").await.unwrap().unwrap(), json!({"new": 2}));
    }

    #[tokio::test]
    async fn file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assessments.db");

        {
            let store = LibSqlDocumentStore::new_local(&path).await.unwrap();
            store.write("u1", &json!({"a": 1}), false).await.unwrap();
        }

        let reopened = LibSqlDocumentStore::new_local(&path).await.unwrap();
        assert_eq!(
            reopened.read("u1").await.unwrap().unwrap(),
            json!({"a": 1})
        );
    }
}
