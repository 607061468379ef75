//! Session domain module.
//!
//! Holds the per-request [`SessionRecord`], the [`SessionPayload`] persisted
//! by identifier stores, the [`ExpiryPolicy`] and the error taxonomy shared by
//! the lifecycle and the store adapters.

mod errors;
mod expiry;
mod record;

pub use errors::{SessionError, StoreError};
pub use expiry::{ExpiryPolicy, DEFAULT_IDLE_TIMEOUT};
pub use record::{SessionPayload, SessionRecord};
