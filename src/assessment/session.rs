//! Session lifecycle — creation, lookup, and teardown of per-user sessions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::model::Session;

/// Shared handle to one user's session.
///
/// The inner mutex is the per-user serialization point: the controller holds
/// it across read-then-append operations (including the oracle call), which
/// upholds the one-open-turn invariant without any global lock. Operations
/// on different user_ids run fully in parallel.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Injectable session store. Backed by an in-memory map here; a
/// store-backed implementation can be swapped in without touching the
/// controller.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the session for `user_id`, creating it if unseen.
    async fn get_or_create(&self, user_id: &str) -> SessionHandle;

    /// Fetch the session for `user_id`, if it exists.
    async fn get(&self, user_id: &str) -> Option<SessionHandle>;

    /// Delete the session for `user_id`. Returns false if absent.
    async fn remove(&self, user_id: &str) -> bool;

    /// Number of live sessions (for the health endpoint).
    async fn active_count(&self) -> usize;
}

/// In-memory session store.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_or_create(&self, user_id: &str) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(user_id) {
            return Arc::clone(handle);
        }
        let mut sessions = self.sessions.write().await;
        // Re-check under the write lock: another task may have created it.
        if let Some(handle) = sessions.get(user_id) {
            return Arc::clone(handle);
        }
        tracing::info!(user_id, "Creating new interview session");
        let handle = Arc::new(Mutex::new(Session::new(user_id)));
        sessions.insert(user_id.to_string(), Arc::clone(&handle));
        handle
    }

    async fn get(&self, user_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(user_id).map(Arc::clone)
    }

    async fn remove(&self, user_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(user_id).is_some();
        if removed {
            tracing::info!(user_id, "Cleared interview session");
        }
        removed
    }

    async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
