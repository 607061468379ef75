//! Header pair token transport.
//!
//! The client sends `X-Session: <token>`; responses carry the same header
//! plus `X-Session-Expiry` as an HTTP-date.

use http::header::HeaderName;
use http::{HeaderMap, HeaderValue};

use crate::domain::foundation::Timestamp;
use crate::ports::{TokenTransport, TransportError};

pub const SESSION_HEADER: HeaderName = HeaderName::from_static("x-session");
pub const SESSION_EXPIRY_HEADER: HeaderName = HeaderName::from_static("x-session-expiry");

/// Session token carried in `X-Session` / `X-Session-Expiry`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderTransport;

impl HeaderTransport {
    pub fn new() -> Self {
        Self
    }
}

fn header_value(raw: &str) -> Result<HeaderValue, TransportError> {
    HeaderValue::from_str(raw).map_err(|e| TransportError::InvalidHeaderValue(e.to_string()))
}

impl TokenTransport for HeaderTransport {
    fn read_token(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    }

    fn write_token(
        &self,
        headers: &mut HeaderMap,
        token: &str,
        expires_at: Timestamp,
    ) -> Result<(), TransportError> {
        let token = header_value(token)?;
        let expiry = header_value(&expires_at.to_http_date())?;
        headers.insert(SESSION_HEADER, token);
        headers.insert(SESSION_EXPIRY_HEADER, expiry);
        Ok(())
    }

    fn clear_token(&self, headers: &mut HeaderMap) {
        headers.insert(SESSION_HEADER, HeaderValue::from_static(""));
        headers.remove(SESSION_EXPIRY_HEADER);
    }
}
