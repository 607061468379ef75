//! Unclassified failures as they leave a chain step.
//!
//! Textual and generic failures built through the constructors below capture
//! the call stack at construction, so a failure returned from a handler keeps
//! the handler's frames after the handler has returned.

use std::any::Any;
use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use super::classified::ClassifiedFailure;

/// A failure of unknown shape, before classification.
pub enum RawFailure {
    /// Already structured; passed through unchanged.
    Structured(ClassifiedFailure),
    /// A plain message.
    Textual(String),
    /// An error value without a status.
    Generic(Box<dyn StdError + Send + Sync + 'static>),
    /// Anything else, e.g. a non-string panic payload.
    Opaque(Box<dyn Any + Send + 'static>),
    /// A failure plus the stack captured where it arose.
    Traced(Box<RawFailure>, Backtrace),
}

impl RawFailure {
    /// Wraps an arbitrary error value, capturing the caller's stack.
    pub fn generic<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        RawFailure::Generic(Box::new(err)).traced(Backtrace::force_capture())
    }

    /// A plain message, capturing the caller's stack.
    pub fn textual(message: impl Into<String>) -> Self {
        RawFailure::Textual(message.into()).traced(Backtrace::force_capture())
    }

    /// Normalizes a panic payload from `catch_unwind`.
    ///
    /// `panic!("..")` payloads become `Textual`; `std::panic::panic_any`
    /// with a [`ClassifiedFailure`] or a boxed error keeps its structure.
    /// `backtrace` is the stack recorded at the panic site, if any.
    pub fn from_panic(payload: Box<dyn Any + Send + 'static>, backtrace: Option<Backtrace>) -> Self {
        let raw = Self::from_payload(payload);
        match backtrace {
            Some(backtrace) => raw.traced(backtrace),
            None => raw,
        }
    }

    fn from_payload(payload: Box<dyn Any + Send + 'static>) -> Self {
        let payload = match payload.downcast::<ClassifiedFailure>() {
            Ok(failure) => return RawFailure::Structured(*failure),
            Err(other) => other,
        };
        let payload = match payload.downcast::<String>() {
            Ok(message) => return RawFailure::Textual(*message),
            Err(other) => other,
        };
        let payload = match payload.downcast::<&'static str>() {
            Ok(message) => return RawFailure::Textual((*message).to_string()),
            Err(other) => other,
        };
        match payload.downcast::<Box<dyn StdError + Send + Sync + 'static>>() {
            Ok(err) => RawFailure::Generic(*err),
            Err(other) => RawFailure::Opaque(other),
        }
    }

    /// Attach an origin stack. Structured failures and failures that already
    /// carry one are left as they are.
    pub fn traced(self, backtrace: Backtrace) -> Self {
        match self {
            RawFailure::Structured(_) | RawFailure::Traced(..) => self,
            raw => RawFailure::Traced(Box::new(raw), backtrace),
        }
    }

    /// True if an origin stack was captured.
    pub fn has_origin_trace(&self) -> bool {
        matches!(self, RawFailure::Traced(..))
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RawFailure::Structured(_) => "structured",
            RawFailure::Textual(_) => "textual",
            RawFailure::Generic(_) => "generic",
            RawFailure::Opaque(_) => "opaque",
            RawFailure::Traced(inner, _) => inner.kind(),
        }
    }
}

impl fmt::Debug for RawFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawFailure::Structured(failure) => f.debug_tuple("Structured").field(failure).finish(),
            RawFailure::Textual(message) => f.debug_tuple("Textual").field(message).finish(),
            RawFailure::Generic(err) => f.debug_tuple("Generic").field(err).finish(),
            RawFailure::Opaque(_) => f.debug_tuple("Opaque").finish_non_exhaustive(),
            RawFailure::Traced(inner, _) => f.debug_tuple("Traced").field(inner).finish_non_exhaustive(),
        }
    }
}

impl From<ClassifiedFailure> for RawFailure {
    fn from(failure: ClassifiedFailure) -> Self {
        RawFailure::Structured(failure)
    }
}

impl From<String> for RawFailure {
    fn from(message: String) -> Self {
        RawFailure::textual(message)
    }
}

impl From<&str> for RawFailure {
    fn from(message: &str) -> Self {
        RawFailure::textual(message)
    }
}

impl From<crate::domain::session::SessionError> for RawFailure {
    fn from(err: crate::domain::session::SessionError) -> Self {
        RawFailure::generic(err)
    }
}

impl From<crate::domain::session::StoreError> for RawFailure {
    fn from(err: crate::domain::session::StoreError) -> Self {
        RawFailure::generic(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, panic_any};

    fn payload_of(f: impl FnOnce() + std::panic::UnwindSafe) -> Box<dyn Any + Send> {
        catch_unwind(f).expect_err("closure must panic")
    }

    #[test]
    fn static_str_panic_is_textual() {
        let raw = RawFailure::from_panic(payload_of(|| panic!("boom")), None);
        assert!(matches!(raw, RawFailure::Textual(ref m) if m == "boom"));
    }

    #[test]
    fn formatted_panic_is_textual() {
        let raw = RawFailure::from_panic(payload_of(|| panic!("attempt {}", 3)), None);
        assert!(matches!(raw, RawFailure::Textual(ref m) if m == "attempt 3"));
    }

    #[test]
    fn classified_panic_stays_structured() {
        let raw = RawFailure::from_panic(
            payload_of(|| panic_any(ClassifiedFailure::forbidden("nope"))),
            Some(Backtrace::force_capture()),
        );
        match raw {
            RawFailure::Structured(failure) => assert_eq!(failure.message(), "nope"),
            other => panic!("expected structured, got {:?}", other),
        }
    }

    #[test]
    fn unknown_payload_is_opaque() {
        let raw = RawFailure::from_panic(payload_of(|| panic_any(42_u64)), None);
        assert_eq!(raw.kind(), "opaque");
        assert!(!raw.has_origin_trace());
    }

    #[test]
    fn panic_with_recorded_stack_is_traced() {
        let raw = RawFailure::from_panic(
            payload_of(|| panic!("boom")),
            Some(Backtrace::force_capture()),
        );
        assert!(raw.has_origin_trace());
        assert_eq!(raw.kind(), "textual");
    }

    #[test]
    fn constructors_capture_origin_stack() {
        assert!(RawFailure::from("db exploded").has_origin_trace());
        assert!(RawFailure::from("db exploded".to_string()).has_origin_trace());

        let raw: RawFailure = crate::domain::session::SessionError::NotActive.into();
        assert_eq!(raw.kind(), "generic");
        assert!(raw.has_origin_trace());
    }

    #[test]
    fn tracing_twice_keeps_the_first_stack() {
        let raw = RawFailure::from("once").traced(Backtrace::force_capture());
        match raw {
            RawFailure::Traced(inner, _) => assert!(matches!(*inner, RawFailure::Textual(_))),
            other => panic!("expected traced, got {:?}", other),
        }
    }
}
