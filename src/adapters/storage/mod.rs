//! Storage Adapters
//!
//! Implementations of the IdentifierStore port for persisting sessions.
//!
//! ## Available Adapters
//!
//! - **InMemoryIdentifierStore** - Map behind a lock (testing/development)
//! - **FileIdentifierStore** - One JSON file per session on disk
//! - **PostgresIdentifierStore** - One row per session
//! - **RedisIdentifierStore** - One key per session with native TTL
//!
//! ## Usage
//!
//! ```ignore
//! use adapters::storage::{FileIdentifierStore, InMemoryIdentifierStore};
//!
//! // Production: file-based storage
//! let store = FileIdentifierStore::open("./session.cache").await?;
//!
//! // Testing: in-memory storage
//! let store = InMemoryIdentifierStore::new();
//! ```

mod factory;
mod file;
mod in_memory;
mod postgres;
mod redis;

pub use factory::open_store;
pub use file::FileIdentifierStore;
pub use in_memory::InMemoryIdentifierStore;
pub use postgres::PostgresIdentifierStore;
pub use redis::RedisIdentifierStore;
