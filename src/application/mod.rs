//! Application layer - Session lifecycle orchestration.
//!
//! Coordinates the session domain model with the `IdentifierStore` port.

mod lifecycle;

pub use lifecycle::{SessionLifecycle, DEFAULT_MAX_CREATE_ATTEMPTS};
