//! Adapters - Implementations of ports for specific technologies.
//!
//! - `storage` - IdentifierStore backends (memory, file, PostgreSQL, Redis)
//! - `transport` - TokenTransport implementations (cookie, header, signed)
//! - `http` - axum middleware, extractor and routes

pub mod http;
pub mod storage;
pub mod transport;
