//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the session core and the outside world. Adapters implement these ports.
//!
//! - `IdentifierStore` - durable session backend (memory, file, PostgreSQL, Redis)
//! - `TokenTransport` - how the session token travels (cookie, header pair)

mod identifier_store;
mod token_transport;

pub use identifier_store::IdentifierStore;
pub use token_transport::{TokenTransport, TransportError};
