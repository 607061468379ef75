//! HTTP middleware for axum.
//!
//! - `guard` - Session resolution/commit and failure-to-response translation
//! - `access_log` - One log line per request, with intercepted failure details

pub mod access_log;
pub mod guard;

pub use access_log::{access_log_middleware, AccessLog, AccessRecord};
pub use guard::{
    render_failure, request_guard_middleware, run_step, GuardError, GuardPhase, GuardState,
    PendingFailure, RequestGuard, StepOutcome,
};
