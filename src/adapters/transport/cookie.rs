//! Cookie token transport.
//!
//! Reads the session token from the request's `Cookie` header and writes it
//! back as a `Set-Cookie` with the configured attributes.

use cookie::time::{Duration as CookieDuration, OffsetDateTime};
use cookie::{Cookie, SameSite};
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};

use crate::domain::foundation::Timestamp;
use crate::ports::{TokenTransport, TransportError};

/// Default cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "session_id";

/// Session token carried in a named cookie.
#[derive(Debug, Clone)]
pub struct CookieTransport {
    name: String,
    domain: Option<String>,
    path: String,
    persist: bool,
    secure: bool,
    http_only: bool,
    same_site: SameSite,
}

impl Default for CookieTransport {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            domain: None,
            path: "/".to_string(),
            persist: true,
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
        }
    }
}

impl CookieTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// When false the cookie carries no expiry and dies with the browser session.
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn build(&self, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::build((self.name.clone(), value))
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only)
            .same_site(self.same_site)
            .build();
        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }
        cookie
    }

    fn append(headers: &mut HeaderMap, cookie: &Cookie<'_>) -> Result<(), TransportError> {
        let value = HeaderValue::from_str(&cookie.to_string())
            .map_err(|e| TransportError::InvalidHeaderValue(e.to_string()))?;
        headers.append(SET_COOKIE, value);
        Ok(())
    }
}

impl TokenTransport for CookieTransport {
    fn read_token(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == self.name && !cookie.value().is_empty())
            .map(|cookie| cookie.value().to_string())
    }

    fn write_token(
        &self,
        headers: &mut HeaderMap,
        token: &str,
        expires_at: Timestamp,
    ) -> Result<(), TransportError> {
        let mut cookie = self.build(token.to_string());

        if self.persist {
            let remaining = expires_at.duration_since(&Timestamp::now()).num_seconds();
            cookie.set_max_age(CookieDuration::seconds(remaining.max(0)));
            if let Ok(at) = OffsetDateTime::from_unix_timestamp(expires_at.as_unix_secs() as i64) {
                cookie.set_expires(at);
            }
        }

        Self::append(headers, &cookie)
    }

    fn clear_token(&self, headers: &mut HeaderMap) {
        let mut cookie = self.build(String::new());
        cookie.make_removal();
        if let Err(e) = Self::append(headers, &cookie) {
            tracing::warn!(error = %e, "Failed to write session cookie removal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_cookie(headers: &HeaderMap) -> Cookie<'static> {
        let raw = headers.get(SET_COOKIE).unwrap().to_str().unwrap().to_string();
        Cookie::parse(raw).unwrap()
    }

    #[test]
    fn reads_named_cookie_among_others() {
        let transport = CookieTransport::default();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; session_id=abc123; lang=en"),
        );

        assert_eq!(transport.read_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn reads_across_multiple_cookie_headers() {
        let transport = CookieTransport::new("sid");
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(COOKIE, HeaderValue::from_static("sid=xyz"));

        assert_eq!(transport.read_token(&headers), Some("xyz".to_string()));
    }

    #[test]
    fn missing_or_empty_cookie_reads_as_none() {
        let transport = CookieTransport::default();
        let mut headers = HeaderMap::new();
        assert_eq!(transport.read_token(&headers), None);

        headers.insert(COOKIE, HeaderValue::from_static("session_id="));
        assert_eq!(transport.read_token(&headers), None);
    }

    #[test]
    fn written_cookie_carries_configured_attributes() {
        let transport = CookieTransport::default()
            .with_domain("example.com")
            .with_secure(true)
            .with_same_site(SameSite::Strict);
        let mut headers = HeaderMap::new();

        transport
            .write_token(&mut headers, "abc", Timestamp::now().plus_secs(600))
            .unwrap();

        let cookie = set_cookie(&headers);
        assert_eq!(cookie.name(), "session_id");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        let max_age = cookie.max_age().unwrap().whole_seconds();
        assert!((595..=600).contains(&max_age));
    }

    #[test]
    fn non_persistent_cookie_has_no_expiry() {
        let transport = CookieTransport::default().with_persist(false);
        let mut headers = HeaderMap::new();

        transport
            .write_token(&mut headers, "abc", Timestamp::now().plus_secs(600))
            .unwrap();

        let cookie = set_cookie(&headers);
        assert!(cookie.max_age().is_none());
        assert!(cookie.expires().is_none());
    }

    #[test]
    fn clear_token_expires_cookie() {
        let transport = CookieTransport::default();
        let mut headers = HeaderMap::new();

        transport.clear_token(&mut headers);

        let cookie = set_cookie(&headers);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
    }
}
