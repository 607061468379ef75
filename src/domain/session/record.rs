//! In-memory session record and its persisted payload.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{SessionId, Timestamp};

use super::errors::SessionError;

/// One request's view of a session.
///
/// # Invariants
///
/// - `valid` is true only between a successful start/resume and a delete
/// - `data` is only mutated while `valid`
/// - a nil `id` means "no session"
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SessionRecord {
    id: SessionId,
    valid: bool,
    data: HashMap<String, String>,
    #[serde(skip)]
    created_at: Option<Timestamp>,
    #[serde(skip)]
    accessed_at: Option<Timestamp>,
    #[serde(skip)]
    modified: bool,
}

impl SessionRecord {
    /// An empty record with no identifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// A record carrying an inbound identifier that has not been resumed yet.
    pub fn with_id(id: SessionId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// True if `data` changed since the last start/resume/commit.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn created_at(&self) -> Option<Timestamp> {
        self.created_at
    }

    pub fn accessed_at(&self) -> Option<Timestamp> {
        self.accessed_at
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn data(&self) -> &HashMap<String, String> {
        &self.data
    }

    /// Sets a value, returning the previous one.
    ///
    /// # Errors
    ///
    /// - `NotActive` if the session has not been started or resumed
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, SessionError> {
        self.ensure_valid()?;
        self.modified = true;
        Ok(self.data.insert(key.into(), value.into()))
    }

    /// Removes a value, returning it if present.
    ///
    /// # Errors
    ///
    /// - `NotActive` if the session has not been started or resumed
    pub fn remove(&mut self, key: &str) -> Result<Option<String>, SessionError> {
        self.ensure_valid()?;
        let removed = self.data.remove(key);
        self.modified |= removed.is_some();
        Ok(removed)
    }

    /// Removes every value.
    ///
    /// # Errors
    ///
    /// - `NotActive` if the session has not been started or resumed
    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.ensure_valid()?;
        self.modified |= !self.data.is_empty();
        self.data.clear();
        Ok(())
    }

    fn ensure_valid(&self) -> Result<(), SessionError> {
        if self.valid {
            Ok(())
        } else {
            Err(SessionError::NotActive)
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Lifecycle transitions (driven by SessionLifecycle)
    // ───────────────────────────────────────────────────────────────

    pub(crate) fn activate_new(&mut self, id: SessionId, now: Timestamp) {
        self.id = id;
        self.valid = true;
        self.data.clear();
        self.created_at = Some(now);
        self.accessed_at = Some(now);
        self.modified = false;
    }

    pub(crate) fn activate_from(&mut self, payload: SessionPayload, now: Timestamp) {
        self.valid = true;
        self.data = payload.data;
        self.created_at = Some(payload.created_at);
        self.accessed_at = Some(now);
        self.modified = false;
    }

    pub(crate) fn mark_accessed(&mut self, now: Timestamp) {
        self.accessed_at = Some(now);
    }

    pub(crate) fn mark_committed(&mut self) {
        self.modified = false;
    }

    pub(crate) fn invalidate(&mut self) {
        self.id = SessionId::nil();
        self.valid = false;
        self.data.clear();
        self.created_at = None;
        self.accessed_at = None;
        self.modified = false;
    }

    /// Snapshot for persistence; `None` unless the record is valid.
    pub(crate) fn to_payload(&self, expires_at: Timestamp) -> Option<SessionPayload> {
        if !self.valid {
            return None;
        }
        let now = Timestamp::now();
        Some(SessionPayload {
            data: self.data.clone(),
            created_at: self.created_at.unwrap_or(now),
            accessed_at: self.accessed_at.unwrap_or(now),
            expires_at,
        })
    }
}

/// Value persisted under a session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    #[serde(default)]
    pub data: HashMap<String, String>,
    pub created_at: Timestamp,
    pub accessed_at: Timestamp,
    pub expires_at: Timestamp,
}

impl SessionPayload {
    /// Empty payload for a session created at `now`.
    pub fn empty(now: Timestamp, expires_at: Timestamp) -> Self {
        Self {
            data: HashMap::new(),
            created_at: now,
            accessed_at: now,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        !self.expires_at.is_after(&now)
    }

    pub fn to_json(&self) -> Result<String, super::StoreError> {
        serde_json::to_string(self).map_err(|e| super::StoreError::serialization(e.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self, super::StoreError> {
        serde_json::from_str(raw).map_err(|e| super::StoreError::serialization(e.to_string()))
    }
}
