//! HTTP routes for the session endpoints and the guarded application.

use axum::{
    extract::Path,
    http::StatusCode,
    middleware,
    routing::{delete, get},
    Json, Router,
};
use serde_json::{json, Value};

use crate::domain::failure::{ClassifiedFailure, RawFailure};
use crate::domain::session::SessionError;

use super::current_session::CurrentSession;
use super::middleware::{access_log_middleware, request_guard_middleware, AccessLog, GuardState};

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// GET / - The current session identifier
pub async fn current_session_id(session: CurrentSession) -> Json<Value> {
    Json(json!({ "session_id": session.id().await.to_string() }))
}

/// PUT /session/:key - Store the request body under `key`
pub async fn put_value(
    session: CurrentSession,
    Path(key): Path<String>,
    body: String,
) -> Result<StatusCode, RawFailure> {
    session.insert(key, body).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /session/:key - Read a stored value
pub async fn get_value(
    session: CurrentSession,
    Path(key): Path<String>,
) -> Result<Json<Value>, ClassifiedFailure> {
    match session.get(&key).await {
        Some(value) => Ok(Json(json!({ "key": key, "value": value }))),
        None => Err(ClassifiedFailure::not_found(format!("No value stored for '{}'", key))),
    }
}

/// DELETE /session - End the session
pub async fn delete_session(session: CurrentSession) -> Result<StatusCode, RawFailure> {
    match session.delete().await {
        Ok(()) | Err(SessionError::SessionNotFound) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(e.into()),
    }
}

/// Creates the session router with all endpoints.
pub fn session_routes() -> Router {
    Router::new()
        .route("/", get(current_session_id))
        .route("/session", delete(delete_session))
        .route("/session/:key", get(get_value).put(put_value))
}

/// Wraps a router in the request guard and, outside it, the access log.
pub fn guarded(router: Router, guard: GuardState, access_log: AccessLog) -> Router {
    router
        .layer(middleware::from_fn_with_state(guard, request_guard_middleware))
        .layer(middleware::from_fn_with_state(access_log, access_log_middleware))
}
