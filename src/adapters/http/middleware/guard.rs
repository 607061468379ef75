//! Request guard middleware.
//!
//! Wraps the rest of the chain for one request:
//!
//! ```text
//! Request → resolve session from inbound token → insert SessionSlot
//!              ↓
//!         next.run() ── panic ──────────────┐
//!              │      ── Err(RawFailure) ───┤
//!              ↓                            ↓
//!   commit session, write token     classify, render {"error": ...},
//!                                   attach ClassifiedFailure, stop
//! ```
//!
//! Handlers signal failure either by panicking or by returning
//! `Err(RawFailure)` (or anything convertible into it). The returned error is
//! parked on the response and classified here, so every failure is
//! classified exactly once.
//!
//! # Example
//!
//! ```ignore
//! let state = GuardState::new(lifecycle, Arc::new(CookieTransport::default()));
//!
//! let app = Router::new()
//!     .route("/", get(handler))
//!     .layer(middleware::from_fn_with_state(state, request_guard_middleware));
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use futures::FutureExt;
use thiserror::Error;

use crate::adapters::http::current_session::SessionSlot;
use crate::application::SessionLifecycle;
use crate::domain::failure::{
    classify, install_panic_hook, take_panic_backtrace, ClassifiedFailure, RawFailure,
    StatusCategory,
};
use crate::domain::foundation::{SessionId, Timestamp};
use crate::ports::TokenTransport;

/// Frames between the capture point and the guard's caller.
const INTERCEPT_SKIP_FRAMES: usize = 2;

/// Shared state for [`request_guard_middleware`].
#[derive(Clone)]
pub struct GuardState {
    lifecycle: Arc<SessionLifecycle>,
    transport: Arc<dyn TokenTransport>,
    handle_panic: bool,
}

impl GuardState {
    pub fn new(lifecycle: Arc<SessionLifecycle>, transport: Arc<dyn TokenTransport>) -> Self {
        Self {
            lifecycle,
            transport,
            handle_panic: true,
        }
    }

    /// When false, panics propagate past the guard untouched.
    pub fn with_handle_panic(mut self, handle_panic: bool) -> Self {
        self.handle_panic = handle_panic;
        self
    }

    pub fn lifecycle(&self) -> &Arc<SessionLifecycle> {
        &self.lifecycle
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Guard state machine
// ════════════════════════════════════════════════════════════════════════════

/// Result of running the rest of the chain.
pub enum StepOutcome {
    Completed(Response),
    Failed(RawFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPhase {
    Armed,
    Completed,
    Intercepted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("Request guard already finalized ({0:?})")]
    AlreadyFinalized(GuardPhase),
}

/// Per-request guard: `Armed → Completed | Intercepted`, both terminal.
#[derive(Debug)]
pub struct RequestGuard {
    phase: GuardPhase,
}

impl RequestGuard {
    pub fn arm() -> Self {
        Self {
            phase: GuardPhase::Armed,
        }
    }

    pub fn phase(&self) -> GuardPhase {
        self.phase
    }

    fn finalize(&mut self, to: GuardPhase) -> Result<(), GuardError> {
        if self.phase != GuardPhase::Armed {
            return Err(GuardError::AlreadyFinalized(self.phase));
        }
        self.phase = to;
        Ok(())
    }

    /// Mark the request as having completed normally.
    pub fn complete(&mut self) -> Result<(), GuardError> {
        self.finalize(GuardPhase::Completed)
    }

    /// Classify a failure and render the client response.
    ///
    /// The classified failure rides along in the response extensions for the
    /// access log.
    pub fn intercept(&mut self, raw: RawFailure) -> Result<Response, GuardError> {
        self.finalize(GuardPhase::Intercepted)?;
        let failure = classify(raw, INTERCEPT_SKIP_FRAMES);
        Ok(render_failure(failure))
    }
}

/// `{"error": <client message>}` with the failure's status.
///
/// 4xx and 501 keep their status; every other category renders as 500.
pub fn render_failure(failure: ClassifiedFailure) -> Response {
    let status = match failure.status().category() {
        StatusCategory::ClientError | StatusCategory::NotImplemented => {
            StatusCode::from_u16(failure.status().as_u16())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        StatusCategory::Success | StatusCategory::ServerError | StatusCategory::Other => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let mut response = (
        status,
        Json(serde_json::json!({ "error": failure.client_message() })),
    )
        .into_response();
    response.extensions_mut().insert(failure);
    response
}

// ════════════════════════════════════════════════════════════════════════════
// Returned failures
// ════════════════════════════════════════════════════════════════════════════

/// A handler's returned failure, parked on the response until the guard
/// takes it.
#[derive(Clone)]
pub struct PendingFailure(Arc<Mutex<Option<RawFailure>>>);

impl PendingFailure {
    fn new(raw: RawFailure) -> Self {
        Self(Arc::new(Mutex::new(Some(raw))))
    }

    fn take(&self) -> Option<RawFailure> {
        match self.0.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl IntoResponse for RawFailure {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(PendingFailure::new(self));
        response
    }
}

impl IntoResponse for ClassifiedFailure {
    fn into_response(self) -> Response {
        RawFailure::Structured(self).into_response()
    }
}

/// Run the rest of the chain, turning panics and returned failures into
/// `Failed`.
///
/// A caught panic carries the stack recorded at the panic site.
pub async fn run_step(next: Next, request: Request, handle_panic: bool) -> StepOutcome {
    let mut response = if handle_panic {
        install_panic_hook();
        match AssertUnwindSafe(next.run(request)).catch_unwind().await {
            Ok(response) => response,
            Err(payload) => {
                let backtrace = take_panic_backtrace();
                return StepOutcome::Failed(RawFailure::from_panic(payload, backtrace));
            }
        }
    } else {
        next.run(request).await
    };

    match response
        .extensions_mut()
        .remove::<PendingFailure>()
        .and_then(|pending| pending.take())
    {
        Some(raw) => StepOutcome::Failed(raw),
        None => StepOutcome::Completed(response),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Middleware
// ════════════════════════════════════════════════════════════════════════════

/// Per-request session and failure guard.
///
/// This middleware:
/// 1. Resolves the session named by the inbound token (or starts one)
/// 2. Exposes it to handlers through the `CurrentSession` extractor
/// 3. Runs the rest of the chain, catching panics when enabled
/// 4. On failure, renders the classified response and stops; the session is
///    not committed
/// 5. On success, commits the session and writes the outbound token
pub async fn request_guard_middleware(
    State(state): State<GuardState>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut guard = RequestGuard::arm();

    let token = state.transport.read_token(request.headers());
    let record = match state.lifecycle.resolve(token.as_deref()).await {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to resolve session");
            return intercepted(&mut guard, RawFailure::from(e));
        }
    };

    // Resumed sessions keep the identifier the client sent.
    let started_here = token
        .as_deref()
        .and_then(|token| token.parse::<SessionId>().ok())
        != Some(record.id());

    let slot = SessionSlot::new(record, state.lifecycle.clone());
    request.extensions_mut().insert(slot.clone());

    let mut response = match run_step(next, request, state.handle_panic).await {
        StepOutcome::Completed(response) => response,
        StepOutcome::Failed(raw) => {
            let mut response = intercepted(&mut guard, raw);
            settle_failed(&state, &slot, started_here, &mut response).await;
            return response;
        }
    };

    let mut record = slot.record().lock().await;
    if record.is_valid() {
        if let Err(e) = state.lifecycle.commit(&mut record).await {
            tracing::error!(session_id = %record.id(), error = %e, "Failed to commit session");
            return intercepted(&mut guard, RawFailure::from(e));
        }
        let expires_at = state
            .lifecycle
            .expires_at(&record)
            .unwrap_or_else(Timestamp::now);
        if let Err(e) =
            state
                .transport
                .write_token(response.headers_mut(), &record.id().to_string(), expires_at)
        {
            return intercepted(&mut guard, RawFailure::generic(e));
        }
    } else {
        state.transport.clear_token(response.headers_mut());
    }

    if let Err(e) = guard.complete() {
        tracing::error!(error = %e, "Request guard state violation");
    }
    response
}

/// Session cleanup after an intercepted failure; nothing is committed.
///
/// A session the handler deleted has its token cleared. A session started by
/// this request is removed again, since its token never reaches the client.
async fn settle_failed(
    state: &GuardState,
    slot: &SessionSlot,
    started_here: bool,
    response: &mut Response,
) {
    let mut record = slot.record().lock().await;
    if !record.is_valid() {
        state.transport.clear_token(response.headers_mut());
    } else if started_here {
        let id = record.id();
        if let Err(e) = state.lifecycle.delete(&mut record).await {
            tracing::warn!(session_id = %id, error = %e, "Failed to discard uncommitted session");
        }
    }
}

fn intercepted(guard: &mut RequestGuard, raw: RawFailure) -> Response {
    match guard.intercept(raw) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Request guard state violation");
            render_failure(ClassifiedFailure::internal(e.to_string()))
        }
    }
}
