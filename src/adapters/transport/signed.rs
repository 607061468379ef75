//! HMAC-SHA256 signed token transport.
//!
//! Wraps another transport so the token travels as `<token>.<hex tag>`. Tokens
//! whose tag does not verify are dropped on read, which makes the lifecycle
//! start a fresh session instead of trusting a forged identifier.

use hmac::{Hmac, Mac};
use http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::foundation::Timestamp;
use crate::ports::{TokenTransport, TransportError};

type HmacSha256 = Hmac<Sha256>;

const TAG_SEPARATOR: char = '.';

/// Signs outbound tokens and verifies inbound ones.
#[derive(Clone)]
pub struct SignedTransport<T> {
    inner: T,
    mac: HmacSha256,
}

impl<T: TokenTransport> SignedTransport<T> {
    /// Build from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSigningKey` if the key is empty.
    pub fn new(inner: T, key: &[u8]) -> Result<Self, TransportError> {
        if key.is_empty() {
            return Err(TransportError::InvalidSigningKey(
                "key must not be empty".to_string(),
            ));
        }
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|e| TransportError::InvalidSigningKey(e.to_string()))?;
        Ok(Self { inner, mac })
    }

    /// Build from a hex-encoded secret.
    pub fn from_hex_secret(inner: T, secret: &SecretString) -> Result<Self, TransportError> {
        let key = hex::decode(secret.expose_secret().trim())
            .map_err(|e| TransportError::InvalidSigningKey(e.to_string()))?;
        Self::new(inner, &key)
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn tag(&self, token: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// `<token>.<hex tag>`
    pub fn sign(&self, token: &str) -> String {
        format!("{}{}{}", token, TAG_SEPARATOR, hex::encode(self.tag(token)))
    }

    /// Returns the bare token if its tag verifies.
    pub fn verify(&self, signed: &str) -> Option<String> {
        let (token, tag_hex) = signed.rsplit_once(TAG_SEPARATOR)?;
        let tag = hex::decode(tag_hex).ok()?;
        if constant_time_compare(&self.tag(token), &tag) {
            Some(token.to_string())
        } else {
            None
        }
    }
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

impl<T: TokenTransport> TokenTransport for SignedTransport<T> {
    fn read_token(&self, headers: &HeaderMap) -> Option<String> {
        let signed = self.inner.read_token(headers)?;
        let verified = self.verify(&signed);
        if verified.is_none() {
            tracing::warn!("Rejected session token with invalid signature");
        }
        verified
    }

    fn write_token(
        &self,
        headers: &mut HeaderMap,
        token: &str,
        expires_at: Timestamp,
    ) -> Result<(), TransportError> {
        self.inner.write_token(headers, &self.sign(token), expires_at)
    }

    fn clear_token(&self, headers: &mut HeaderMap) {
        self.inner.clear_token(headers);
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SignedTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedTransport")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}
