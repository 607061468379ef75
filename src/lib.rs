//! Session Guard - Request-scoped sessions and failure-to-response translation
//!
//! This crate issues, resumes, persists and invalidates session identifiers
//! for axum services, and turns panics or handler failures into well-formed
//! JSON responses while keeping diagnostic detail for operators.
//!
//! # Layout
//!
//! - `domain` - session record, expiry policy, failure model and classifier
//! - `ports` - `IdentifierStore` and `TokenTransport` contracts
//! - `application` - `SessionLifecycle`
//! - `adapters` - stores, transports, axum middleware and routes
//! - `config` - environment-driven configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
