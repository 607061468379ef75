//! Token transport adapters.
//!
//! - **CookieTransport** - token in a named cookie
//! - **HeaderTransport** - token in `X-Session`, expiry in `X-Session-Expiry`
//! - **SignedTransport** - HMAC-SHA256 tag around either of the above

mod cookie;
mod factory;
mod header;
mod signed;

pub use self::cookie::{CookieTransport, DEFAULT_COOKIE_NAME};
pub use factory::build_transport;
pub use header::{HeaderTransport, SESSION_EXPIRY_HEADER, SESSION_HEADER};
pub use signed::SignedTransport;
