//! In-Memory Identifier Store Adapter
//!
//! Keeps session payloads in a map behind a tokio `RwLock`.
//! Useful for testing, development and single-process deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{SessionId, Timestamp};
use crate::domain::session::{SessionPayload, StoreError};
use crate::ports::IdentifierStore;

/// In-memory storage for session payloads
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentifierStore {
    entries: Arc<RwLock<HashMap<SessionId, SessionPayload>>>,
}

impl InMemoryIdentifierStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored sessions (useful for tests)
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Get the number of stored sessions
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl IdentifierStore for InMemoryIdentifierStore {
    async fn exists(&self, id: SessionId) -> bool {
        self.entries.read().await.contains_key(&id)
    }

    async fn create(&self, id: SessionId, payload: &SessionPayload) -> Result<(), StoreError> {
        // Check and insert under one write guard
        let mut entries = self.entries.write().await;
        if entries.contains_key(&id) {
            return Err(StoreError::AlreadyExists);
        }
        entries.insert(id, payload.clone());
        Ok(())
    }

    async fn load(&self, id: SessionId) -> Result<SessionPayload, StoreError> {
        self.entries
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn save(&self, id: SessionId, payload: &SessionPayload) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&id) {
            Some(entry) => {
                *entry = payload.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, payload| !payload.is_expired_at(now));
        Ok((before - entries.len()) as u64)
    }

    async fn close(&self) {}
}
