//! Structured failure carrying status, message and operator diagnostics.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::status::FailureStatus;

/// A failure normalized to a status plus operator-only diagnostics.
///
/// Only `message` of a 4xx failure ever reaches the client. `data` and
/// `stack_trace` are for logs.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{message}")]
pub struct ClassifiedFailure {
    status: FailureStatus,
    message: String,
    data: Map<String, Value>,
    stack_trace: String,
}

impl ClassifiedFailure {
    pub fn new(status: impl Into<FailureStatus>, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            message: message.into(),
            data: Map::new(),
            stack_trace: String::new(),
        }
    }

    /// A client-caused failure whose message is safe to disclose.
    pub fn client(status: u16, message: impl Into<String>) -> Self {
        Self::new(FailureStatus::new(status), message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(FailureStatus::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(FailureStatus::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FailureStatus::NOT_FOUND, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(FailureStatus::NOT_IMPLEMENTED, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FailureStatus::INTERNAL_SERVER_ERROR, message)
    }

    /// Attaches an operator-only diagnostic value.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = stack_trace.into();
        self
    }

    pub fn status(&self) -> FailureStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn stack_trace(&self) -> &str {
        &self.stack_trace
    }

    /// The text a client may see: the message for 4xx, a generic
    /// category string for everything else.
    pub fn client_message(&self) -> &str {
        if self.status.is_501_not_implemented() {
            NOT_IMPLEMENTED_BODY
        } else if self.status.is_4xx_client_error() {
            &self.message
        } else {
            INTERNAL_ERROR_BODY
        }
    }
}

/// Body text for 501 failures.
pub const NOT_IMPLEMENTED_BODY: &str = "501 Not Implemented";

/// Body text for every non-4xx, non-501 failure.
pub const INTERNAL_ERROR_BODY: &str = "500 Internal Server Error";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_discloses_4xx_only() {
        assert_eq!(ClassifiedFailure::forbidden("forbidden").client_message(), "forbidden");
        assert_eq!(
            ClassifiedFailure::internal("db exploded").client_message(),
            INTERNAL_ERROR_BODY
        );
        assert_eq!(
            ClassifiedFailure::not_implemented("TODO: export").client_message(),
            NOT_IMPLEMENTED_BODY
        );
    }

    #[test]
    fn non_error_statuses_are_not_disclosed() {
        let failure = ClassifiedFailure::new(FailureStatus::new(302), "moved to /secret");
        assert_eq!(failure.client_message(), INTERNAL_ERROR_BODY);
    }

    #[test]
    fn with_data_accumulates() {
        let failure = ClassifiedFailure::internal("boom")
            .with_data("table", "sessions")
            .with_data("attempt", 3);
        assert_eq!(failure.data().len(), 2);
        assert_eq!(failure.data()["attempt"], Value::from(3));
    }

    #[test]
    fn display_is_the_message() {
        assert_eq!(ClassifiedFailure::bad_request("missing key").to_string(), "missing key");
    }
}
