//! Redis-backed identifier store for multi-server deployments.
//!
//! Each session is a single string key holding the JSON payload, with a
//! millisecond TTL matching the payload's deadline. Redis evicts expired
//! entries itself, so `delete_expired` has nothing to do.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::config::RedisConfig;
use crate::domain::foundation::{SessionId, Timestamp};
use crate::domain::session::{SessionPayload, StoreError};
use crate::ports::IdentifierStore;

const DEFAULT_KEY_PREFIX: &str = "session:";

/// Redis-backed storage for session payloads.
///
/// `create` uses `SET NX` and `save` uses `SET XX`, so existence checks and
/// writes are a single atomic command.
#[derive(Clone)]
pub struct RedisIdentifierStore {
    conn: MultiplexedConnection,
    key_prefix: String,
}

impl RedisIdentifierStore {
    /// Create a new Redis store over an existing connection.
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    /// Open a multiplexed connection using the configured URL, timeout and
    /// key prefix.
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(config.url.as_str()).map_err(redis_error)?;
        let conn = tokio::time::timeout(
            config.timeout(),
            client.get_multiplexed_tokio_connection(),
        )
        .await
        .map_err(|_| StoreError::io("Timed out connecting to Redis"))?
        .map_err(redis_error)?;
        Ok(Self::new(conn).with_key_prefix(config.key_prefix.clone()))
    }

    /// Set the prefix prepended to every session key.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn key(&self, id: SessionId) -> String {
        format!("{}{}", self.key_prefix, id)
    }

    /// Remaining lifetime in milliseconds, never less than one.
    fn ttl_millis(payload: &SessionPayload) -> u64 {
        let remaining = payload.expires_at.duration_since(&Timestamp::now());
        u64::try_from(remaining.num_milliseconds()).unwrap_or(0).max(1)
    }

    /// `SET key value <condition> PX ttl`, returning whether the write happened.
    async fn set_conditional(
        &self,
        id: SessionId,
        payload: &SessionPayload,
        condition: &str,
    ) -> Result<bool, StoreError> {
        let json = payload.to_json()?;
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(id))
            .arg(json)
            .arg(condition)
            .arg("PX")
            .arg(Self::ttl_millis(payload))
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        Ok(reply.is_some())
    }
}

fn redis_error(e: redis::RedisError) -> StoreError {
    StoreError::io(e.to_string())
}

#[async_trait]
impl IdentifierStore for RedisIdentifierStore {
    async fn exists(&self, id: SessionId) -> bool {
        let mut conn = self.conn.clone();
        match conn.exists::<_, bool>(self.key(id)).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, "Redis existence check failed");
                false
            }
        }
    }

    async fn create(&self, id: SessionId, payload: &SessionPayload) -> Result<(), StoreError> {
        if self.set_conditional(id, payload, "NX").await? {
            Ok(())
        } else {
            Err(StoreError::AlreadyExists)
        }
    }

    async fn load(&self, id: SessionId) -> Result<SessionPayload, StoreError> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.get(self.key(id)).await.map_err(redis_error)?;
        match json {
            Some(json) => SessionPayload::from_json(&json),
            None => Err(StoreError::NotFound),
        }
    }

    async fn save(&self, id: SessionId, payload: &SessionPayload) -> Result<(), StoreError> {
        if self.set_conditional(id, payload, "XX").await? {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(self.key(id)).await.map_err(redis_error)?;
        if removed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_expired(&self, _now: Timestamp) -> Result<u64, StoreError> {
        Ok(0)
    }

    async fn close(&self) {
        tracing::debug!("Redis identifier store closed");
    }
}

impl std::fmt::Debug for RedisIdentifierStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisIdentifierStore")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}
