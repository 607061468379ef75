//! Builds the configured token transport.

use std::sync::Arc;

use ::cookie::SameSite;

use crate::config::{SameSitePolicy, SessionConfig, TransportKind};
use crate::ports::{TokenTransport, TransportError};

use super::{CookieTransport, HeaderTransport, SignedTransport};

fn same_site(policy: SameSitePolicy) -> SameSite {
    match policy {
        SameSitePolicy::Strict => SameSite::Strict,
        SameSitePolicy::Lax => SameSite::Lax,
        SameSitePolicy::None => SameSite::None,
    }
}

fn cookie_transport(config: &SessionConfig) -> CookieTransport {
    let transport = CookieTransport::new(config.cookie_name.clone())
        .with_path(config.cookie_path.clone())
        .with_persist(config.cookie_persist)
        .with_secure(config.cookie_secure)
        .with_http_only(config.cookie_http_only)
        .with_same_site(same_site(config.cookie_same_site));
    match &config.cookie_domain {
        Some(domain) => transport.with_domain(domain.clone()),
        None => transport,
    }
}

/// Cookie or header transport, wrapped in a signature when a secret is set.
pub fn build_transport(config: &SessionConfig) -> Result<Arc<dyn TokenTransport>, TransportError> {
    let transport: Arc<dyn TokenTransport> = match (config.transport, &config.signing_secret) {
        (TransportKind::Cookie, None) => Arc::new(cookie_transport(config)),
        (TransportKind::Cookie, Some(secret)) => Arc::new(SignedTransport::from_hex_secret(
            cookie_transport(config),
            secret,
        )?),
        (TransportKind::Header, None) => Arc::new(HeaderTransport::new()),
        (TransportKind::Header, Some(secret)) => Arc::new(SignedTransport::from_hex_secret(
            HeaderTransport::new(),
            secret,
        )?),
    };
    Ok(transport)
}
