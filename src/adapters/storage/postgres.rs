//! PostgreSQL implementation of IdentifierStore.
//!
//! One row per session. `create` relies on the primary key:
//! `INSERT ... ON CONFLICT DO NOTHING` affecting zero rows means the
//! identifier was taken.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::collections::HashMap;

use crate::config::DatabaseConfig;
use crate::domain::foundation::{SessionId, Timestamp};
use crate::domain::session::{SessionPayload, StoreError};
use crate::ports::IdentifierStore;

const DEFAULT_TABLE_NAME: &str = "sessions";

/// PostgreSQL implementation of IdentifierStore.
#[derive(Clone)]
pub struct PostgresIdentifierStore {
    pool: PgPool,
    table_name: String,
}

impl PostgresIdentifierStore {
    /// Creates a new PostgresIdentifierStore over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            table_name: DEFAULT_TABLE_NAME.to_string(),
        }
    }

    /// Connects a pool sized and timed from configuration, using the
    /// configured table name.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(config.idle_timeout())
            .max_lifetime(config.max_lifetime())
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::io(format!("Failed to connect to database: {}", e)))?;
        Self::new(pool).with_table_name(config.table_name.clone())
    }

    /// Uses a custom table name.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the name is not a plain SQL identifier.
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Result<Self, StoreError> {
        let table_name = table_name.into();
        let valid = !table_name.is_empty()
            && table_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !table_name.starts_with(|c: char| c.is_ascii_digit());
        if !valid {
            return Err(StoreError::io(format!("Invalid table name: {}", table_name)));
        }
        self.table_name = table_name;
        Ok(self)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Creates the session table and its expiry index if missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id UUID PRIMARY KEY,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                accessed_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL
            )
            "#,
            table = self.table_name
        );
        let create_index = format!(
            "CREATE INDEX IF NOT EXISTS {table}_expiry_idx ON {table} (expires_at)",
            table = self.table_name
        );

        for statement in [create_table, create_index] {
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .map_err(|e| database_error("bootstrap session table", e))?;
        }

        tracing::info!(table = %self.table_name, "Session table ready");
        Ok(())
    }
}

fn database_error(action: &str, e: sqlx::Error) -> StoreError {
    StoreError::io(format!("Failed to {}: {}", action, e))
}

#[async_trait]
impl IdentifierStore for PostgresIdentifierStore {
    async fn exists(&self, id: SessionId) -> bool {
        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            self.table_name
        );
        match sqlx::query_scalar::<_, bool>(&query)
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                // A missing table means nothing exists yet
                tracing::debug!(error = %e, "Session existence check failed");
                false
            }
        }
    }

    async fn create(&self, id: SessionId, payload: &SessionPayload) -> Result<(), StoreError> {
        let query = format!(
            r#"
            INSERT INTO {} (id, data, created_at, accessed_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
            self.table_name
        );
        let result = sqlx::query(&query)
            .bind(id.as_uuid())
            .bind(Json(&payload.data))
            .bind(payload.created_at.as_datetime())
            .bind(payload.accessed_at.as_datetime())
            .bind(payload.expires_at.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| database_error("insert session", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists);
        }
        Ok(())
    }

    async fn load(&self, id: SessionId) -> Result<SessionPayload, StoreError> {
        let query = format!(
            "SELECT data, created_at, accessed_at, expires_at FROM {} WHERE id = $1",
            self.table_name
        );
        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database_error("fetch session", e))?
            .ok_or(StoreError::NotFound)?;

        let decode = |e: sqlx::Error| StoreError::serialization(e.to_string());
        let Json(data): Json<HashMap<String, String>> = row.try_get("data").map_err(decode)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;
        let accessed_at: DateTime<Utc> = row.try_get("accessed_at").map_err(decode)?;
        let expires_at: DateTime<Utc> = row.try_get("expires_at").map_err(decode)?;

        Ok(SessionPayload {
            data,
            created_at: Timestamp::from_datetime(created_at),
            accessed_at: Timestamp::from_datetime(accessed_at),
            expires_at: Timestamp::from_datetime(expires_at),
        })
    }

    async fn save(&self, id: SessionId, payload: &SessionPayload) -> Result<(), StoreError> {
        let query = format!(
            r#"
            UPDATE {} SET
                data = $2,
                accessed_at = $3,
                expires_at = $4
            WHERE id = $1
            "#,
            self.table_name
        );
        let result = sqlx::query(&query)
            .bind(id.as_uuid())
            .bind(Json(&payload.data))
            .bind(payload.accessed_at.as_datetime())
            .bind(payload.expires_at.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| database_error("update session", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
        let query = format!("DELETE FROM {} WHERE id = $1", self.table_name);
        let result = sqlx::query(&query)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| database_error("delete session", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        let query = format!("DELETE FROM {} WHERE expires_at <= $1", self.table_name);
        let result = sqlx::query(&query)
            .bind(now.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| database_error("purge expired sessions", e))?;
        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

impl std::fmt::Debug for PostgresIdentifierStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresIdentifierStore")
            .field("table_name", &self.table_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_store() -> PostgresIdentifierStore {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/sessions")
            .unwrap();
        PostgresIdentifierStore::new(pool)
    }

    #[tokio::test]
    async fn default_table_name_is_sessions() {
        assert_eq!(lazy_store().table_name(), "sessions");
    }

    #[tokio::test]
    async fn table_name_must_be_a_plain_identifier() {
        assert!(lazy_store().with_table_name("app_sessions").is_ok());
        assert!(lazy_store().with_table_name("sessions; DROP TABLE users").is_err());
        assert!(lazy_store().with_table_name("1sessions").is_err());
        assert!(lazy_store().with_table_name("").is_err());
    }

    // Requires a running PostgreSQL instance:
    // SESSION_GUARD_TEST_DATABASE_URL=postgresql://... cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn create_collides_on_existing_id() {
        let url = std::env::var("SESSION_GUARD_TEST_DATABASE_URL").unwrap();
        let pool = PgPoolOptions::new().connect(&url).await.unwrap();
        let store = PostgresIdentifierStore::new(pool);
        store.ensure_schema().await.unwrap();

        let now = Timestamp::now();
        let payload = SessionPayload::empty(now, now.plus_secs(60));
        let id = SessionId::generate();

        store.create(id, &payload).await.unwrap();
        assert_eq!(store.create(id, &payload).await, Err(StoreError::AlreadyExists));
        assert!(store.exists(id).await);
        store.delete(id).await.unwrap();
        assert_eq!(store.delete(id).await, Err(StoreError::NotFound));
    }
}
