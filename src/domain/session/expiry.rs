//! Idle and absolute session expiry.

use std::time::Duration;

use crate::domain::foundation::Timestamp;

/// Idle timeout used when none (or zero) is configured.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Expiry policy for sessions.
///
/// A session expires at the earlier of:
/// - `accessed_at + idle_timeout`
/// - `created_at + lifetime` (only when a lifetime is set)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    idle_timeout: Duration,
    lifetime: Option<Duration>,
}

impl ExpiryPolicy {
    /// Zero durations mean "use the default idle timeout" and "no absolute
    /// lifetime" respectively.
    pub fn new(idle_timeout: Duration, lifetime: Duration) -> Self {
        Self {
            idle_timeout: if idle_timeout.is_zero() {
                DEFAULT_IDLE_TIMEOUT
            } else {
                idle_timeout
            },
            lifetime: (!lifetime.is_zero()).then_some(lifetime),
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn lifetime(&self) -> Option<Duration> {
        self.lifetime
    }

    /// Deadline for a session created at `created_at` and last used at `accessed_at`.
    pub fn expires_at(&self, created_at: Timestamp, accessed_at: Timestamp) -> Timestamp {
        let idle_deadline = accessed_at.plus(self.idle_timeout);
        match self.lifetime {
            Some(lifetime) => idle_deadline.min(created_at.plus(lifetime)),
            None => idle_deadline,
        }
    }

    pub fn is_expired(&self, created_at: Timestamp, accessed_at: Timestamp, now: Timestamp) -> bool {
        !self.expires_at(created_at, accessed_at).is_after(&now)
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT, Duration::ZERO)
    }
}
