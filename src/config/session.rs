//! Session lifecycle and token transport configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::session::ExpiryPolicy;

/// How the session token travels between client and server
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Cookie,
    Header,
}

/// Cookie `SameSite` attribute
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    #[default]
    Lax,
    None,
}

/// Session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Token transport (cookie or header)
    #[serde(default)]
    pub transport: TransportKind,

    /// Session cookie name
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Cookie domain attribute
    pub cookie_domain: Option<String>,

    /// Cookie path attribute
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,

    /// Send an expiry with the cookie; otherwise it dies with the browser
    #[serde(default = "default_true")]
    pub cookie_persist: bool,

    #[serde(default)]
    pub cookie_secure: bool,

    #[serde(default = "default_true")]
    pub cookie_http_only: bool,

    #[serde(default)]
    pub cookie_same_site: SameSitePolicy,

    /// Absolute session lifetime in seconds (0 = unlimited)
    #[serde(default)]
    pub lifetime_secs: u64,

    /// Idle timeout in seconds (0 = default of 30 minutes)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Convert handler panics into 500 responses
    #[serde(default = "default_true")]
    pub handle_panic: bool,

    /// Identifiers drawn before giving up on a new session
    #[serde(default = "default_max_create_attempts")]
    pub max_create_attempts: u32,

    /// Hex-encoded HMAC key; when set, tokens are signed
    pub signing_secret: Option<SecretString>,
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }

    pub fn expiry_policy(&self) -> ExpiryPolicy {
        ExpiryPolicy::new(self.idle_timeout(), self.lifetime())
    }

    /// Validate session configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name_ok = !self.cookie_name.is_empty()
            && self
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?={}".contains(c));
        if !name_ok {
            return Err(ValidationError::InvalidCookieName(self.cookie_name.clone()));
        }
        if !self.cookie_path.starts_with('/') {
            return Err(ValidationError::InvalidCookiePath);
        }
        if self.transport == TransportKind::Cookie
            && self.cookie_same_site == SameSitePolicy::None
            && !self.cookie_secure
        {
            return Err(ValidationError::SameSiteNoneRequiresSecure);
        }
        if self.max_create_attempts == 0 {
            return Err(ValidationError::InvalidMaxCreateAttempts);
        }
        if let Some(secret) = &self.signing_secret {
            let secret = secret.expose_secret().trim();
            if secret.is_empty() || hex::decode(secret).is_err() {
                return Err(ValidationError::InvalidSigningSecret);
            }
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            cookie_name: default_cookie_name(),
            cookie_domain: None,
            cookie_path: default_cookie_path(),
            cookie_persist: true,
            cookie_secure: false,
            cookie_http_only: true,
            cookie_same_site: SameSitePolicy::default(),
            lifetime_secs: 0,
            idle_timeout_secs: default_idle_timeout(),
            handle_panic: true,
            max_create_attempts: default_max_create_attempts(),
            signing_secret: None,
        }
    }
}

fn default_cookie_name() -> String {
    "session_id".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_idle_timeout() -> u64 {
    30 * 60
}

fn default_max_create_attempts() -> u32 {
    8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.transport, TransportKind::Cookie);
        assert_eq!(config.cookie_name, "session_id");
        assert!(config.cookie_http_only);
        assert!(!config.cookie_secure);
        assert!(config.handle_panic);
        assert_eq!(config.idle_timeout(), Duration::from_secs(1800));
        assert_eq!(config.expiry_policy().lifetime(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_idle_timeout_uses_default_policy() {
        let config = SessionConfig {
            idle_timeout_secs: 0,
            lifetime_secs: 3600,
            ..Default::default()
        };
        let policy = config.expiry_policy();
        assert_eq!(policy.idle_timeout(), Duration::from_secs(1800));
        assert_eq!(policy.lifetime(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_validation_cookie_name() {
        for name in ["", "session id", "sid;", "a=b"] {
            let config = SessionConfig {
                cookie_name: name.to_string(),
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(ValidationError::InvalidCookieName(_))),
                "accepted {:?}",
                name
            );
        }
    }

    #[test]
    fn test_validation_same_site_none_needs_secure() {
        let mut config = SessionConfig {
            cookie_same_site: SameSitePolicy::None,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::SameSiteNoneRequiresSecure)
        ));

        config.cookie_secure = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_signing_secret_must_be_hex() {
        let config = SessionConfig {
            signing_secret: Some(SecretString::new("zz-not-hex".to_string())),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidSigningSecret)
        ));

        let config = SessionConfig {
            signing_secret: Some(SecretString::new("00ff".repeat(8))),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_max_create_attempts() {
        let config = SessionConfig {
            max_create_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidMaxCreateAttempts)
        ));
    }
}
