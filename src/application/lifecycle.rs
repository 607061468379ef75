//! SessionLifecycle - Orchestrates session start/resume/commit/delete against a store.
//!
//! The store is the single source of truth for identifier uniqueness: a fresh
//! identifier is only accepted once `create` succeeds, and a collision simply
//! draws another one.

use std::sync::Arc;

use crate::domain::foundation::{SessionId, Timestamp};
use crate::domain::session::{
    ExpiryPolicy, SessionError, SessionPayload, SessionRecord, StoreError,
};
use crate::ports::IdentifierStore;

/// Attempts at drawing an unused identifier before `start` gives up.
pub const DEFAULT_MAX_CREATE_ATTEMPTS: u32 = 8;

/// Drives a [`SessionRecord`] through its lifecycle.
///
/// Cheap to share: wrap in an `Arc` and hand the same instance to every request.
pub struct SessionLifecycle {
    store: Arc<dyn IdentifierStore>,
    expiry: ExpiryPolicy,
    max_create_attempts: u32,
}

impl SessionLifecycle {
    pub fn new(store: Arc<dyn IdentifierStore>, expiry: ExpiryPolicy) -> Self {
        Self {
            store,
            expiry,
            max_create_attempts: DEFAULT_MAX_CREATE_ATTEMPTS,
        }
    }

    /// Cap the number of identifiers drawn by `start`. Zero is treated as one.
    pub fn with_max_create_attempts(mut self, attempts: u32) -> Self {
        self.max_create_attempts = attempts.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn IdentifierStore> {
        &self.store
    }

    pub fn expiry(&self) -> &ExpiryPolicy {
        &self.expiry
    }

    /// Deadline of a started or resumed record; `None` otherwise.
    pub fn expires_at(&self, record: &SessionRecord) -> Option<Timestamp> {
        if !record.is_valid() {
            return None;
        }
        let created_at = record.created_at()?;
        let accessed_at = record.accessed_at().unwrap_or(created_at);
        Some(self.expiry.expires_at(created_at, accessed_at))
    }

    /// Allocate a fresh identifier and persist an empty session under it.
    ///
    /// A record that is already valid is left untouched.
    ///
    /// # Errors
    ///
    /// - `Store(Io)` once every attempt collided
    /// - `Store(..)` for the first non-collision store error
    pub async fn start(&self, record: &mut SessionRecord) -> Result<(), SessionError> {
        if record.is_valid() && !record.id().is_nil() {
            return Ok(());
        }

        for attempt in 1..=self.max_create_attempts {
            let id = SessionId::generate();
            let now = Timestamp::now();
            let payload = SessionPayload::empty(now, self.expiry.expires_at(now, now));

            match self.store.create(id, &payload).await {
                Ok(()) => {
                    record.activate_new(id, now);
                    tracing::debug!(session_id = %id, attempt, "Session started");
                    return Ok(());
                }
                Err(StoreError::AlreadyExists) => {
                    tracing::debug!(session_id = %id, attempt, "Session identifier collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(
            attempts = self.max_create_attempts,
            "Session identifier allocation exhausted"
        );
        Err(StoreError::io(format!(
            "identifier allocation failed after {} attempts",
            self.max_create_attempts
        ))
        .into())
    }

    /// Load the session named by the record's identifier.
    ///
    /// Expired sessions are deleted (best effort) and reported as not found.
    ///
    /// # Errors
    ///
    /// - `NoIdentifier` if the record has no identifier
    /// - `SessionNotFound` if the store has no live entry; the record's id is cleared
    /// - `Store(..)` for any other store failure
    pub async fn resume(&self, record: &mut SessionRecord) -> Result<(), SessionError> {
        let id = record.id();
        if id.is_nil() {
            return Err(SessionError::NoIdentifier);
        }

        let payload = match self.store.load(id).await {
            Ok(payload) => payload,
            Err(StoreError::NotFound) => {
                record.invalidate();
                return Err(SessionError::SessionNotFound);
            }
            Err(e) => return Err(e.into()),
        };

        let now = Timestamp::now();
        if payload.is_expired_at(now)
            || self
                .expiry
                .is_expired(payload.created_at, payload.accessed_at, now)
        {
            match self.store.delete(id).await {
                Ok(()) | Err(StoreError::NotFound) => {}
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "Failed to delete expired session");
                }
            }
            record.invalidate();
            tracing::debug!(session_id = %id, "Session expired");
            return Err(SessionError::SessionNotFound);
        }

        record.activate_from(payload, now);
        tracing::debug!(session_id = %id, "Session resumed");
        Ok(())
    }

    /// Bump the last-access time and persist it.
    pub async fn touch(&self, record: &mut SessionRecord) -> Result<(), SessionError> {
        if !record.is_valid() {
            return Err(SessionError::NotActive);
        }
        record.mark_accessed(Timestamp::now());
        self.commit(record).await
    }

    /// Persist the record's data and timestamps.
    ///
    /// On failure the record stays valid in memory.
    ///
    /// # Errors
    ///
    /// - `NotActive` if the record was never started/resumed
    /// - `Store(..)` if the save fails
    pub async fn commit(&self, record: &mut SessionRecord) -> Result<(), SessionError> {
        let expires_at = self.expires_at(record).ok_or(SessionError::NotActive)?;
        let payload = record
            .to_payload(expires_at)
            .ok_or(SessionError::NotActive)?;
        let id = record.id();
        if id.is_nil() {
            return Err(SessionError::NoIdentifier);
        }

        self.store.save(id, &payload).await?;
        record.mark_committed();
        tracing::debug!(session_id = %id, "Session committed");
        Ok(())
    }

    /// Remove the session from the store and invalidate the record.
    ///
    /// # Errors
    ///
    /// - `NoIdentifier` if the record has no identifier
    /// - `SessionNotFound` if the store had no entry (the record is still invalidated)
    /// - `Store(..)` for any other store failure
    pub async fn delete(&self, record: &mut SessionRecord) -> Result<(), SessionError> {
        let id = record.id();
        if id.is_nil() {
            return Err(SessionError::NoIdentifier);
        }

        match self.store.delete(id).await {
            Ok(()) => {
                record.invalidate();
                tracing::debug!(session_id = %id, "Session deleted");
                Ok(())
            }
            Err(StoreError::NotFound) => {
                record.invalidate();
                Err(SessionError::SessionNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resume the session named by an inbound token, or start a new one.
    ///
    /// Missing, unparsable, unknown and expired tokens all fall back to `start`.
    pub async fn resolve(&self, token: Option<&str>) -> Result<SessionRecord, SessionError> {
        if let Some(token) = token {
            match token.parse::<SessionId>() {
                Ok(id) if !id.is_nil() => {
                    let mut record = SessionRecord::with_id(id);
                    match self.resume(&mut record).await {
                        Ok(()) => return Ok(record),
                        Err(SessionError::SessionNotFound) => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "Ignoring unparsable session token");
                }
            }
        }

        let mut record = SessionRecord::new();
        self.start(&mut record).await?;
        Ok(record)
    }

    /// Remove every entry whose deadline has passed.
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        self.store.delete_expired(Timestamp::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::InMemoryIdentifierStore;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn lifecycle_over(store: Arc<dyn IdentifierStore>) -> SessionLifecycle {
        SessionLifecycle::new(store, ExpiryPolicy::default())
    }

    fn in_memory() -> (Arc<InMemoryIdentifierStore>, SessionLifecycle) {
        let store = Arc::new(InMemoryIdentifierStore::new());
        let lifecycle = lifecycle_over(store.clone());
        (store, lifecycle)
    }

    /// Reports `AlreadyExists` for the first `collisions` creates.
    struct CollidingStore {
        inner: InMemoryIdentifierStore,
        collisions: u32,
        creates: AtomicU32,
    }

    impl CollidingStore {
        fn new(collisions: u32) -> Self {
            Self {
                inner: InMemoryIdentifierStore::new(),
                collisions,
                creates: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl IdentifierStore for CollidingStore {
        async fn exists(&self, id: SessionId) -> bool {
            self.inner.exists(id).await
        }

        async fn create(&self, id: SessionId, payload: &SessionPayload) -> Result<(), StoreError> {
            if self.creates.fetch_add(1, Ordering::SeqCst) < self.collisions {
                return Err(StoreError::AlreadyExists);
            }
            self.inner.create(id, payload).await
        }

        async fn load(&self, id: SessionId) -> Result<SessionPayload, StoreError> {
            self.inner.load(id).await
        }

        async fn save(&self, id: SessionId, payload: &SessionPayload) -> Result<(), StoreError> {
            self.inner.save(id, payload).await
        }

        async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
            self.inner.delete(id).await
        }

        async fn delete_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
            self.inner.delete_expired(now).await
        }

        async fn close(&self) {}
    }

    /// Accepts creates and loads but fails every save.
    struct FailingSaveStore {
        inner: InMemoryIdentifierStore,
    }

    #[async_trait]
    impl IdentifierStore for FailingSaveStore {
        async fn exists(&self, id: SessionId) -> bool {
            self.inner.exists(id).await
        }

        async fn create(&self, id: SessionId, payload: &SessionPayload) -> Result<(), StoreError> {
            self.inner.create(id, payload).await
        }

        async fn load(&self, id: SessionId) -> Result<SessionPayload, StoreError> {
            self.inner.load(id).await
        }

        async fn save(&self, _id: SessionId, _payload: &SessionPayload) -> Result<(), StoreError> {
            Err(StoreError::io("Simulated save failure"))
        }

        async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
            self.inner.delete(id).await
        }

        async fn delete_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
            self.inner.delete_expired(now).await
        }

        async fn close(&self) {}
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Start
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn start_allocates_and_persists_identifier() {
        let (store, lifecycle) = in_memory();
        let mut record = SessionRecord::new();

        lifecycle.start(&mut record).await.unwrap();

        assert!(record.is_valid());
        assert!(!record.id().is_nil());
        assert!(store.exists(record.id()).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_starts_yield_distinct_identifiers() {
        let (store, lifecycle) = in_memory();
        let lifecycle = Arc::new(lifecycle);

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let lifecycle = lifecycle.clone();
                tokio::spawn(async move {
                    let mut record = SessionRecord::new();
                    lifecycle.start(&mut record).await.unwrap();
                    record.id()
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }

        assert_eq!(ids.len(), 64);
        assert_eq!(store.len().await, 64);
        for id in ids {
            assert!(store.exists(id).await);
        }
    }

    #[tokio::test]
    async fn start_retries_past_collisions() {
        let store = Arc::new(CollidingStore::new(3));
        let lifecycle = lifecycle_over(store.clone());
        let mut record = SessionRecord::new();

        lifecycle.start(&mut record).await.unwrap();

        assert!(record.is_valid());
        assert_eq!(store.creates.load(Ordering::SeqCst), 4);
        assert!(store.exists(record.id()).await);
    }

    #[tokio::test]
    async fn start_gives_up_after_max_attempts() {
        let store = Arc::new(CollidingStore::new(u32::MAX));
        let lifecycle = lifecycle_over(store.clone()).with_max_create_attempts(5);
        let mut record = SessionRecord::new();

        let err = lifecycle.start(&mut record).await.unwrap_err();

        assert!(matches!(err, SessionError::Store(StoreError::Io(_))));
        assert!(err.to_string().contains("5 attempts"));
        assert!(!record.is_valid());
        assert_eq!(store.creates.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn start_on_valid_record_is_a_no_op() {
        let (store, lifecycle) = in_memory();
        let mut record = SessionRecord::new();
        lifecycle.start(&mut record).await.unwrap();
        let id = record.id();

        lifecycle.start(&mut record).await.unwrap();

        assert_eq!(record.id(), id);
        assert_eq!(store.len().await, 1);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Resume
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn resume_keeps_identifier_and_data() {
        let (_store, lifecycle) = in_memory();
        let mut record = SessionRecord::new();
        lifecycle.start(&mut record).await.unwrap();
        record.insert("user", "alice").unwrap();
        lifecycle.commit(&mut record).await.unwrap();

        let mut resumed = SessionRecord::with_id(record.id());
        lifecycle.resume(&mut resumed).await.unwrap();

        assert_eq!(resumed.id(), record.id());
        assert!(resumed.is_valid());
        assert_eq!(resumed.get("user"), Some("alice"));

        lifecycle.resume(&mut resumed).await.unwrap();
        assert_eq!(resumed.id(), record.id());
    }

    #[tokio::test]
    async fn resume_without_identifier_is_rejected() {
        let (_store, lifecycle) = in_memory();
        let mut record = SessionRecord::new();
        assert_eq!(
            lifecycle.resume(&mut record).await,
            Err(SessionError::NoIdentifier)
        );
    }

    #[tokio::test]
    async fn resume_unknown_identifier_clears_it() {
        let (_store, lifecycle) = in_memory();
        let mut record = SessionRecord::with_id(SessionId::generate());

        assert_eq!(
            lifecycle.resume(&mut record).await,
            Err(SessionError::SessionNotFound)
        );
        assert!(record.id().is_nil());
        assert!(!record.is_valid());
    }

    #[tokio::test]
    async fn idle_expired_session_resumes_as_not_found() {
        let store = Arc::new(InMemoryIdentifierStore::new());
        let lifecycle = SessionLifecycle::new(
            store.clone(),
            ExpiryPolicy::new(Duration::from_secs(60), Duration::ZERO),
        );
        let id = SessionId::generate();
        let long_ago = Timestamp::from_unix_secs(1_000);
        let far_future = Timestamp::now().plus_secs(3_600);
        store
            .create(id, &SessionPayload::empty(long_ago, far_future))
            .await
            .unwrap();

        let mut record = SessionRecord::with_id(id);
        assert_eq!(
            lifecycle.resume(&mut record).await,
            Err(SessionError::SessionNotFound)
        );
        assert!(record.id().is_nil());
        assert!(!store.exists(id).await);
    }

    #[tokio::test]
    async fn lifetime_expired_session_resumes_as_not_found() {
        let store = Arc::new(InMemoryIdentifierStore::new());
        let lifecycle = SessionLifecycle::new(
            store.clone(),
            ExpiryPolicy::new(Duration::from_secs(3_600), Duration::from_secs(60)),
        );
        let id = SessionId::generate();
        let now = Timestamp::now();
        let payload = SessionPayload {
            data: Default::default(),
            created_at: Timestamp::from_unix_secs(now.as_unix_secs() - 120),
            accessed_at: now,
            expires_at: now.plus_secs(3_600),
        };
        store.create(id, &payload).await.unwrap();

        let mut record = SessionRecord::with_id(id);
        assert_eq!(
            lifecycle.resume(&mut record).await,
            Err(SessionError::SessionNotFound)
        );
        assert!(!store.exists(id).await);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Commit / touch
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn commit_persists_data() {
        let (store, lifecycle) = in_memory();
        let mut record = SessionRecord::new();
        lifecycle.start(&mut record).await.unwrap();
        record.insert("theme", "dark").unwrap();

        lifecycle.commit(&mut record).await.unwrap();

        assert!(!record.is_modified());
        let stored = store.load(record.id()).await.unwrap();
        assert_eq!(stored.data.get("theme").map(String::as_str), Some("dark"));
    }

    #[tokio::test]
    async fn commit_failure_keeps_record_valid() {
        let store = Arc::new(FailingSaveStore {
            inner: InMemoryIdentifierStore::new(),
        });
        let lifecycle = lifecycle_over(store);
        let mut record = SessionRecord::new();
        lifecycle.start(&mut record).await.unwrap();
        record.insert("k", "v").unwrap();

        let err = lifecycle.commit(&mut record).await.unwrap_err();

        assert!(matches!(err, SessionError::Store(StoreError::Io(_))));
        assert!(record.is_valid());
        assert!(record.is_modified());
        assert_eq!(record.get("k"), Some("v"));
    }

    #[tokio::test]
    async fn commit_inactive_record_is_rejected() {
        let (_store, lifecycle) = in_memory();
        let mut record = SessionRecord::new();
        assert_eq!(
            lifecycle.commit(&mut record).await,
            Err(SessionError::NotActive)
        );
    }

    #[tokio::test]
    async fn touch_extends_stored_deadline() {
        let (store, lifecycle) = in_memory();
        let mut record = SessionRecord::new();
        lifecycle.start(&mut record).await.unwrap();
        let before = store.load(record.id()).await.unwrap().expires_at;

        tokio::time::sleep(Duration::from_millis(20)).await;
        lifecycle.touch(&mut record).await.unwrap();

        let after = store.load(record.id()).await.unwrap().expires_at;
        assert!(after.is_after(&before));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Delete / resolve
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn delete_then_resume_is_not_found() {
        let (store, lifecycle) = in_memory();
        let mut record = SessionRecord::new();
        lifecycle.start(&mut record).await.unwrap();
        let id = record.id();

        lifecycle.delete(&mut record).await.unwrap();
        assert!(record.id().is_nil());
        assert!(!record.is_valid());
        assert!(!store.exists(id).await);

        let mut again = SessionRecord::with_id(id);
        assert_eq!(
            lifecycle.resume(&mut again).await,
            Err(SessionError::SessionNotFound)
        );
        assert!(again.id().is_nil());
    }

    #[tokio::test]
    async fn delete_twice_reports_not_found() {
        let (_store, lifecycle) = in_memory();
        let mut record = SessionRecord::new();
        lifecycle.start(&mut record).await.unwrap();
        let id = record.id();
        lifecycle.delete(&mut record).await.unwrap();

        let mut stale = SessionRecord::with_id(id);
        assert_eq!(
            lifecycle.delete(&mut stale).await,
            Err(SessionError::SessionNotFound)
        );
    }

    #[tokio::test]
    async fn resolve_resumes_known_token() {
        let (_store, lifecycle) = in_memory();
        let mut record = SessionRecord::new();
        lifecycle.start(&mut record).await.unwrap();
        let token = record.id().to_string();

        let resolved = lifecycle.resolve(Some(&token)).await.unwrap();
        assert_eq!(resolved.id(), record.id());
    }

    #[tokio::test]
    async fn resolve_starts_fresh_for_missing_unknown_or_garbage_tokens() {
        let (store, lifecycle) = in_memory();
        let unknown = SessionId::generate().to_string();

        for token in [None, Some(unknown.as_str()), Some("not-a-uuid")] {
            let record = lifecycle.resolve(token).await.unwrap();
            assert!(record.is_valid());
            assert_ne!(record.id().to_string(), unknown);
        }
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn purge_expired_delegates_to_store() {
        let (store, lifecycle) = in_memory();
        let now = Timestamp::now();
        store
            .create(SessionId::generate(), &SessionPayload::empty(now, now))
            .await
            .unwrap();

        assert_eq!(lifecycle.purge_expired().await, Ok(1));
        assert!(store.is_empty().await);
    }
}
