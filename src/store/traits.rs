//! Document store trait — the narrow persistence contract the core needs.
//!
//! A document-oriented key-value store keyed by user_id, supporting
//! partial-field merge-write and point read (the original deployment used
//! Firestore's `set(..., merge=True)`).

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::StoreError;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Write `document` under `user_id`. With `merge`, object fields are
    /// merged recursively into any existing document; without it, the
    /// document is replaced wholesale.
    async fn write(&self, user_id: &str, document: &Value, merge: bool) -> Result<(), StoreError>;

    /// Point read of the document stored under `user_id`.
    async fn read(&self, user_id: &str) -> Result<Option<Value>, StoreError>;
}

/// Recursively merge `incoming` into `existing`. Objects merge per key;
/// any other value (including arrays) replaces the existing one.
pub(crate) fn merge_documents(existing: &mut Value, incoming: &Value) {
    match (existing, incoming) {
        (Value::Object(existing_map), Value::Object(incoming_map)) => {
            for (key, incoming_value) in incoming_map {
                match existing_map.get_mut(key) {
                    Some(existing_value) => merge_documents(existing_value, incoming_value),
                    None => {
                        existing_map.insert(key.clone(), incoming_value.clone());
                    }
                }
            }
        }
        (existing, incoming) => *existing = incoming.clone(),
    }
}

/// In-memory document store for tests.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, Value>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn write(&self, user_id: &str, document: &Value, merge: bool) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        match documents.get_mut(user_id) {
            Some(existing) if merge => merge_documents(existing, document),
            _ => {
                documents.insert(user_id.to_string(), document.clone());
            }
        }
        Ok(())
    }

    async fn read(&self, user_id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.documents.read().await.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_is_recursive_for_objects() {
        let mut existing = json!({
            "cognitive_profile": {"is_final": false, "assessment": {"a": 1}},
            "untouched": "keep me"
        });
        let incoming = json!({
            "cognitive_profile": {"is_final": true, "classification": {"profile_label": "Adaptive Learner"}}
        });
        merge_documents(&mut existing, &incoming);

        assert_eq!(existing["untouched"], "keep me");
        assert_eq!(existing["cognitive_profile"]["is_final"], true);
        assert_eq!(existing["cognitive_profile"]["assessment"]["a"], 1);
        assert_eq!(
            existing["cognitive_profile"]["classification"]["profile_label"],
            "Adaptive Learner"
        );
    }

    #[test]
    fn merge_replaces_non_object_values() {
        let mut existing = json!({"turns": [1, 2], "n": 2});
        merge_documents(&mut existing, &json!({"turns": [1, 2, 3], "n": 3}));
        assert_eq!(existing["turns"], json!([1, 2, 3]));
        assert_eq!(existing["n"], 3);
    }

    #[tokio::test]
    async fn memory_store_write_read_merge() {
        let store = MemoryDocumentStore::new();
        assert!(store.read("u1").await.unwrap().is_none());

        store
            .write("u1", &json!({"a": 1}), true)
            .await
            .unwrap();
        store
            .write("u1", &json!({"b": 2}), true)
            .await
            .unwrap();
        let doc = store.read("u1").await.unwrap().unwrap();
        assert_eq!(doc, json!({"a": 1, "b": 2}));

        // Non-merge write replaces.
        store.write("u1", &json!({"c": 3}), false).await.unwrap();
        assert_eq!(store.read("u1").await.unwrap().unwrap(), json!({"c": 3}));
    }
}
