//! Session and store error types.

use thiserror::Error;

/// Errors reported by an identifier store backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// `create` found the identifier already present. Nothing was written.
    #[error("Session identifier already exists")]
    AlreadyExists,

    #[error("Session identifier not found")]
    NotFound,

    /// Backend unavailable or corrupt.
    #[error("Store IO failure: {0}")]
    Io(String),

    #[error("Failed to (de)serialize session payload: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn io(message: impl Into<String>) -> Self {
        StoreError::Io(message.into())
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        StoreError::Serialization(message.into())
    }
}

/// Errors surfaced by the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The presented identifier has no live session. The record's id has been
    /// cleared; callers start a fresh session.
    #[error("Session not found")]
    SessionNotFound,

    /// Operation needs an identifier but the record has none.
    #[error("Session has no identifier")]
    NoIdentifier,

    /// Operation needs a valid (started or resumed) session.
    #[error("Session is not active")]
    NotActive,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// True when the caller should treat this as "start a new session".
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::SessionNotFound)
    }
}
