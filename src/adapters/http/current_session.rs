//! `CurrentSession` extractor.
//!
//! The request guard resolves the session before the handler runs and leaves
//! a [`SessionSlot`] in the request extensions. Handlers read and mutate it
//! through [`CurrentSession`]; the guard commits it after the handler returns.
//!
//! # Example
//!
//! ```ignore
//! async fn remember_theme(session: CurrentSession) -> Result<StatusCode, RawFailure> {
//!     session.insert("theme", "dark").await?;
//!     Ok(StatusCode::NO_CONTENT)
//! }
//! ```

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tokio::sync::{Mutex, MutexGuard};

use crate::application::SessionLifecycle;
use crate::domain::failure::INTERNAL_ERROR_BODY;
use crate::domain::foundation::SessionId;
use crate::domain::session::{SessionError, SessionRecord};

/// The request's session record, shared between the guard and the handler.
#[derive(Clone)]
pub struct SessionSlot {
    record: Arc<Mutex<SessionRecord>>,
    lifecycle: Arc<SessionLifecycle>,
}

impl SessionSlot {
    pub fn new(record: SessionRecord, lifecycle: Arc<SessionLifecycle>) -> Self {
        Self {
            record: Arc::new(Mutex::new(record)),
            lifecycle,
        }
    }

    pub fn record(&self) -> &Arc<Mutex<SessionRecord>> {
        &self.record
    }
}

/// Extractor for the current request's session.
///
/// Rejects with 500 if the request guard is not installed.
#[derive(Clone)]
pub struct CurrentSession(SessionSlot);

impl CurrentSession {
    /// Exclusive access to the record for multi-step edits.
    pub async fn lock(&self) -> MutexGuard<'_, SessionRecord> {
        self.0.record.lock().await
    }

    pub async fn id(&self) -> SessionId {
        self.lock().await.id()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.lock().await.get(key).map(str::to_string)
    }

    pub async fn insert(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, SessionError> {
        self.lock().await.insert(key, value)
    }

    pub async fn remove(&self, key: &str) -> Result<Option<String>, SessionError> {
        self.lock().await.remove(key)
    }

    /// Delete the session from the store now; the guard then clears the
    /// client's token instead of committing.
    pub async fn delete(&self) -> Result<(), SessionError> {
        let mut record = self.lock().await;
        self.0.lifecycle.delete(&mut record).await
    }
}

impl<S> axum::extract::FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = SessionRejection;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            parts
                .extensions
                .get::<SessionSlot>()
                .cloned()
                .map(CurrentSession)
                .ok_or(SessionRejection::GuardMissing)
        })
    }
}

/// Rejection for [`CurrentSession`].
#[derive(Debug, Clone)]
pub enum SessionRejection {
    /// No request guard ran for this route.
    GuardMissing,
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        match self {
            SessionRejection::GuardMissing => {
                tracing::error!("CurrentSession used on a route without the request guard");
            }
        }
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": INTERNAL_ERROR_BODY })),
        )
            .into_response()
    }
}
