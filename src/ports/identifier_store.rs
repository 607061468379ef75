//! Identifier store port.
//!
//! Defines the capability set every session backend provides. The store is
//! the single source of truth for identifier uniqueness: `create` is the only
//! collision-detection primitive, and every operation is all-or-nothing for a
//! single identifier.
//!
//! # Design
//!
//! - **Atomic per identifier**: backends use their own transaction/locking
//!   discipline; nothing is layered on top
//! - **Last writer wins**: `save` overwrites the full record
//! - **Absence is not an error for `exists`**: a missing file/table/key is
//!   simply "does not exist"

use async_trait::async_trait;

use crate::domain::foundation::{SessionId, Timestamp};
use crate::domain::session::{SessionPayload, StoreError};

/// Durable mapping from session identifier to session payload.
#[async_trait]
pub trait IdentifierStore: Send + Sync {
    /// Check whether an identifier is present. Never fails.
    async fn exists(&self, id: SessionId) -> bool;

    /// Create an entry if, and only if, the identifier is absent.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if present (no state is mutated)
    /// - `Io` / `Serialization` on backend failure
    async fn create(&self, id: SessionId, payload: &SessionPayload) -> Result<(), StoreError>;

    /// Load the payload stored under an identifier.
    ///
    /// # Errors
    ///
    /// - `NotFound` if absent
    /// - `Io` / `Serialization` on backend failure
    async fn load(&self, id: SessionId) -> Result<SessionPayload, StoreError>;

    /// Overwrite the payload of an existing entry.
    ///
    /// # Errors
    ///
    /// - `NotFound` if absent
    /// - `Io` / `Serialization` on backend failure
    async fn save(&self, id: SessionId, payload: &SessionPayload) -> Result<(), StoreError>;

    /// Remove an entry.
    ///
    /// # Errors
    ///
    /// - `NotFound` if absent
    /// - `Io` on backend failure
    async fn delete(&self, id: SessionId) -> Result<(), StoreError>;

    /// Remove every entry whose `expires_at` is not after `now`.
    ///
    /// Returns the number of entries removed.
    async fn delete_expired(&self, now: Timestamp) -> Result<u64, StoreError>;

    /// Release file handles / connections. Called once on shutdown.
    async fn close(&self);
}
