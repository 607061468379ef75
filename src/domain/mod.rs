//! Domain layer containing the session and failure models.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (session identifier, timestamp)
//! - `session` - Session record, payload, expiry policy and error taxonomy
//! - `failure` - Raw/classified failures and the classifier

pub mod failure;
pub mod foundation;
pub mod session;
