//! Failure-to-response translation model.
//!
//! - [`RawFailure`] - what a chain step fails with
//! - [`classify`] - normalizes any raw failure
//! - [`ClassifiedFailure`] - status, message and operator-only diagnostics

mod classified;
mod classifier;
mod panic_hook;
mod raw;
mod status;

pub use classified::{ClassifiedFailure, INTERNAL_ERROR_BODY, NOT_IMPLEMENTED_BODY};
pub use classifier::{
    capture_stack, classify, render_origin, OPAQUE_VALUE_KEY, UNEXPECTED_ERROR_TYPE,
};
pub use panic_hook::{install_panic_hook, take_panic_backtrace};
pub use raw::RawFailure;
pub use status::{FailureStatus, StatusCategory};
