//! File-based Identifier Store Adapter
//!
//! Stores one JSON file per session under a base directory:
//!
//! ```text
//! session.cache/
//! ├── 550e8400-e29b-41d4-a716-446655440000.json
//! └── 6f1c0b1e-....json
//! ```
//!
//! Entries are never observable half-written:
//! - `create` writes a temp file and hard-links it into place; the link fails
//!   if the target already exists
//! - `save` writes a temp file and renames it over the entry
//!
//! Multi-step mutations (save's existence check and rename, purge's expiry
//! check and unlink) run under a per-identifier lock, so a concurrent delete
//! or save cannot land between the steps.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::foundation::{SessionId, Timestamp};
use crate::domain::session::{SessionPayload, StoreError};
use crate::ports::IdentifierStore;

const ENTRY_EXTENSION: &str = "json";
const TEMP_MARKER: &str = ".tmp-";
const LOCK_SHARDS: usize = 64;

/// File-based storage for session payloads
#[derive(Debug, Clone)]
pub struct FileIdentifierStore {
    base_path: PathBuf,
    locks: Arc<[Mutex<()>]>,
}

impl FileIdentifierStore {
    /// Open (creating if needed) a store rooted at `base_path`
    ///
    /// # Example
    /// ```ignore
    /// let store = FileIdentifierStore::open("./session.cache").await?;
    /// ```
    pub async fn open<P: AsRef<Path>>(base_path: P) -> Result<Self, StoreError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)
            .await
            .map_err(|e| StoreError::io(format!("{}: {}", base_path.display(), e)))?;
        let locks = (0..LOCK_SHARDS).map(|_| Mutex::new(())).collect();
        Ok(Self { base_path, locks })
    }

    /// Serialize mutations of one identifier within this process.
    async fn lock(&self, id: SessionId) -> MutexGuard<'_, ()> {
        let shard = usize::from(id.as_bytes()[15]) % self.locks.len();
        self.locks[shard].lock().await
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the entry file path for a session
    fn entry_path(&self, id: SessionId) -> PathBuf {
        self.base_path.join(format!("{}.{}", id, ENTRY_EXTENSION))
    }

    /// Get a unique temp file path next to the entry
    fn temp_path(&self, id: SessionId) -> PathBuf {
        self.base_path
            .join(format!("{}{}{}", id, TEMP_MARKER, Uuid::new_v4().simple()))
    }

    /// Write the payload to a fresh temp file and return its path
    async fn write_temp(
        &self,
        id: SessionId,
        payload: &SessionPayload,
    ) -> Result<PathBuf, StoreError> {
        let json = payload.to_json()?;
        let temp = self.temp_path(id);
        fs::write(&temp, json).await.map_err(io_error)?;
        Ok(temp)
    }

    async fn discard_temp(temp: &Path) {
        if let Err(e) = fs::remove_file(temp).await {
            tracing::warn!(path = %temp.display(), error = %e, "Failed to remove temp session file");
        }
    }
}

fn io_error(e: std::io::Error) -> StoreError {
    StoreError::io(e.to_string())
}

fn not_found_or_io(e: std::io::Error) -> StoreError {
    if e.kind() == ErrorKind::NotFound {
        StoreError::NotFound
    } else {
        io_error(e)
    }
}

#[async_trait]
impl IdentifierStore for FileIdentifierStore {
    async fn exists(&self, id: SessionId) -> bool {
        fs::try_exists(self.entry_path(id)).await.unwrap_or(false)
    }

    async fn create(&self, id: SessionId, payload: &SessionPayload) -> Result<(), StoreError> {
        let temp = self.write_temp(id, payload).await?;
        let _guard = self.lock(id).await;

        // hard_link refuses to replace an existing entry
        let linked = fs::hard_link(&temp, self.entry_path(id)).await;
        Self::discard_temp(&temp).await;

        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StoreError::AlreadyExists),
            Err(e) => Err(io_error(e)),
        }
    }

    async fn load(&self, id: SessionId) -> Result<SessionPayload, StoreError> {
        let json = fs::read_to_string(self.entry_path(id))
            .await
            .map_err(not_found_or_io)?;
        SessionPayload::from_json(&json)
    }

    async fn save(&self, id: SessionId, payload: &SessionPayload) -> Result<(), StoreError> {
        let temp = self.write_temp(id, payload).await?;
        let _guard = self.lock(id).await;

        if !self.exists(id).await {
            Self::discard_temp(&temp).await;
            return Err(StoreError::NotFound);
        }
        if let Err(e) = fs::rename(&temp, self.entry_path(id)).await {
            Self::discard_temp(&temp).await;
            return Err(io_error(e));
        }
        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
        let _guard = self.lock(id).await;
        fs::remove_file(self.entry_path(id))
            .await
            .map_err(not_found_or_io)
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        let mut dir = match fs::read_dir(&self.base_path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(io_error(e)),
        };

        let mut removed = 0;
        while let Some(entry) = dir.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }

            let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<SessionId>().ok())
            else {
                continue;
            };

            // Check and unlink under the entry's lock so a concurrent save
            // of a fresh payload is never purged.
            let _guard = self.lock(id).await;
            let expired = match fs::read_to_string(&path).await {
                Ok(json) => match SessionPayload::from_json(&json) {
                    Ok(payload) => payload.is_expired_at(now),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Purging unreadable session entry");
                        true
                    }
                },
                // Deleted concurrently
                Err(e) if e.kind() == ErrorKind::NotFound => false,
                Err(e) => return Err(io_error(e)),
            };

            if expired {
                match fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(io_error(e)),
                }
            }
        }

        Ok(removed)
    }

    async fn close(&self) {
        tracing::debug!(path = %self.base_path.display(), "File identifier store closed");
    }
}
