//! HTTP adapters - axum middleware, extractor and routes.
//!
//! - `middleware` - request guard and access log
//! - `current_session` - `CurrentSession` extractor for handlers
//! - `routes` - session endpoints and the guarded application builder

pub mod current_session;
pub mod middleware;
pub mod routes;

pub use current_session::{CurrentSession, SessionRejection, SessionSlot};
pub use middleware::{
    access_log_middleware, request_guard_middleware, AccessLog, GuardState, RequestGuard,
    StepOutcome,
};
pub use routes::{guarded, session_routes};
