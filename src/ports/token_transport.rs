//! Token transport port.
//!
//! A session token travels between client and server either as a cookie or
//! as a request/response header pair, depending on deployment. The lifecycle
//! only needs to read an inbound token and write (or clear) an outbound one.

use http::HeaderMap;

use crate::domain::foundation::Timestamp;

/// Errors raised while building a transport or writing an outbound token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Token cannot be encoded as a header value: {0}")]
    InvalidHeaderValue(String),

    #[error("Invalid token signing key: {0}")]
    InvalidSigningKey(String),
}

/// Pluggable session token transport.
pub trait TokenTransport: Send + Sync {
    /// Read the inbound token, if the request carries one.
    fn read_token(&self, headers: &HeaderMap) -> Option<String>;

    /// Write the outbound token and its expiry onto the response.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHeaderValue` if the token cannot be encoded.
    fn write_token(
        &self,
        headers: &mut HeaderMap,
        token: &str,
        expires_at: Timestamp,
    ) -> Result<(), TransportError>;

    /// Tell the client to forget its token (after a delete).
    fn clear_token(&self, headers: &mut HeaderMap);
}
