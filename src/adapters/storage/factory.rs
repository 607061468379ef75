//! Builds the configured identifier store.

use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};
use crate::domain::session::StoreError;
use crate::ports::IdentifierStore;

use super::{FileIdentifierStore, InMemoryIdentifierStore, PostgresIdentifierStore, RedisIdentifierStore};

/// Open the backend selected by `config.backend`.
///
/// The PostgreSQL table is created on the way if `ensure_schema` is set.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn IdentifierStore>, StoreError> {
    let store: Arc<dyn IdentifierStore> = match config.backend {
        StoreBackend::Memory => Arc::new(InMemoryIdentifierStore::new()),
        StoreBackend::File => Arc::new(FileIdentifierStore::open(&config.file_path).await?),
        StoreBackend::Postgres => {
            let store = PostgresIdentifierStore::connect(&config.database).await?;
            if config.database.ensure_schema {
                store.ensure_schema().await?;
            }
            Arc::new(store)
        }
        StoreBackend::Redis => Arc::new(RedisIdentifierStore::connect(&config.redis).await?),
    };

    tracing::info!(backend = ?config.backend, "Identifier store ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{SessionId, Timestamp};
    use crate::domain::session::SessionPayload;
    use tempfile::TempDir;

    #[tokio::test]
    async fn opens_memory_store() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            ..Default::default()
        };
        let store = open_store(&config).await.unwrap();
        assert!(!store.exists(SessionId::generate()).await);
    }

    #[tokio::test]
    async fn opens_file_store_under_configured_path() {
        let temp = TempDir::new().unwrap();
        let config = StoreConfig {
            backend: StoreBackend::File,
            file_path: temp.path().join("cache"),
            ..Default::default()
        };

        let store = open_store(&config).await.unwrap();
        let now = Timestamp::now();
        let id = SessionId::generate();
        store
            .create(id, &SessionPayload::empty(now, now.plus_secs(60)))
            .await
            .unwrap();

        assert!(temp.path().join("cache").join(format!("{}.json", id)).exists());
    }

    #[tokio::test]
    async fn unreachable_redis_is_an_io_error() {
        let config = StoreConfig {
            backend: StoreBackend::Redis,
            redis: crate::config::RedisConfig {
                url: "not-a-redis-url".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(open_store(&config).await, Err(StoreError::Io(_))));
    }
}
