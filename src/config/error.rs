//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid listen address: {0}")]
    InvalidListenAddress(String),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Invalid session cookie name: {0}")]
    InvalidCookieName(String),

    #[error("Session cookie path must start with '/'")]
    InvalidCookiePath,

    #[error("SameSite=None requires a secure cookie")]
    SameSiteNoneRequiresSecure,

    #[error("Session signing secret must be non-empty hex")]
    InvalidSigningSecret,

    #[error("max_create_attempts must be at least 1")]
    InvalidMaxCreateAttempts,

    #[error("Expired-session purge interval must be positive")]
    InvalidPurgeInterval,
}
