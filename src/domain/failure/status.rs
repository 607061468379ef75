//! HTTP-style status codes for classified failures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse category used to decide what a failure discloses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    Success,
    ClientError,
    NotImplemented,
    ServerError,
    Other,
}

/// Status code attached to a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureStatus(u16);

impl FailureStatus {
    pub const BAD_REQUEST: Self = Self(400);
    pub const UNAUTHORIZED: Self = Self(401);
    pub const FORBIDDEN: Self = Self(403);
    pub const NOT_FOUND: Self = Self(404);
    pub const INTERNAL_SERVER_ERROR: Self = Self(500);
    pub const NOT_IMPLEMENTED: Self = Self(501);

    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    pub fn is_2xx_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    pub fn is_4xx_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    pub fn is_5xx_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }

    pub fn is_501_not_implemented(&self) -> bool {
        self.0 == 501
    }

    /// 501 is reported as its own category even though it is also a 5xx.
    pub fn category(&self) -> StatusCategory {
        if self.is_501_not_implemented() {
            StatusCategory::NotImplemented
        } else if self.is_4xx_client_error() {
            StatusCategory::ClientError
        } else if self.is_5xx_server_error() {
            StatusCategory::ServerError
        } else if self.is_2xx_success() {
            StatusCategory::Success
        } else {
            StatusCategory::Other
        }
    }
}

impl Default for FailureStatus {
    fn default() -> Self {
        Self::INTERNAL_SERVER_ERROR
    }
}

impl fmt::Display for FailureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<http::StatusCode> for FailureStatus {
    fn from(status: http::StatusCode) -> Self {
        Self(status.as_u16())
    }
}
