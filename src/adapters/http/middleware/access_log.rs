//! Access log middleware.
//!
//! Logs one line per request. When the request guard intercepted a failure,
//! the [`ClassifiedFailure`] it attached to the response is logged as well,
//! including the operator-only data and stack trace the client never sees.
//!
//! Install it outside the guard so it observes the final response:
//!
//! ```ignore
//! let app = router
//!     .layer(middleware::from_fn_with_state(guard_state, request_guard_middleware))
//!     .layer(middleware::from_fn_with_state(AccessLog::new("session-guard"), access_log_middleware));
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};

use crate::domain::failure::ClassifiedFailure;

/// Access log settings.
#[derive(Debug, Clone)]
pub struct AccessLog {
    prefix: String,
}

impl AccessLog {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for AccessLog {
    fn default() -> Self {
        Self::new("session-guard")
    }
}

/// One rendered access line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    pub prefix: String,
    pub status: u16,
    pub latency: Duration,
    pub remote_addr: String,
    pub method: Method,
    pub path: String,
}

impl fmt::Display for AccessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} | {:>10} | {:>15} | {:<7} {}",
            self.prefix,
            self.status,
            format!("{:?}", self.latency),
            self.remote_addr,
            self.method.as_str(),
            self.path
        )
    }
}

pub async fn access_log_middleware(
    State(log): State<AccessLog>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let remote_addr = client_addr(request.headers(), connect_info.as_ref());

    let response = next.run(request).await;

    let record = AccessRecord {
        prefix: log.prefix.clone(),
        status: response.status().as_u16(),
        latency: started.elapsed(),
        remote_addr,
        method,
        path,
    };

    match response.extensions().get::<ClassifiedFailure>() {
        Some(failure) => {
            let data = serde_json::Value::Object(failure.data().clone());
            tracing::error!(
                status = record.status,
                latency_ms = record.latency.as_millis() as u64,
                remote_addr = %record.remote_addr,
                method = %record.method,
                path = %record.path,
                error = %failure.message(),
                attached_data = %data,
                stack_trace = %failure.stack_trace(),
                "{}",
                record
            );
        }
        None => {
            tracing::info!(
                status = record.status,
                latency_ms = record.latency.as_millis() as u64,
                remote_addr = %record.remote_addr,
                method = %record.method,
                path = %record.path,
                "{}",
                record
            );
        }
    }

    response
}

/// Client address, preferring proxy headers over the socket address.
fn client_addr(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    if let Some(first) = headers
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
    {
        return first.trim().to_string();
    }
    if let Some(real_ip) = headers.get("X-Real-IP").and_then(|h| h.to_str().ok()) {
        return real_ip.trim().to_string();
    }
    connect_info
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn record_renders_all_fields() {
        let record = AccessRecord {
            prefix: "app".to_string(),
            status: 404,
            latency: Duration::from_millis(3),
            remote_addr: "10.0.0.1".to_string(),
            method: Method::GET,
            path: "/session/theme".to_string(),
        };

        let line = record.to_string();
        assert!(line.starts_with("[app] 404 |"));
        assert!(line.contains("3ms"));
        assert!(line.contains("10.0.0.1"));
        assert!(line.ends_with("GET     /session/theme"));
    }

    #[test]
    fn forwarded_for_wins_over_socket() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        let socket = ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000)));

        assert_eq!(client_addr(&headers, Some(&socket)), "203.0.113.9");
    }

    #[test]
    fn falls_back_to_socket_then_dash() {
        let headers = HeaderMap::new();
        let socket = ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000)));

        assert_eq!(client_addr(&headers, Some(&socket)), "127.0.0.1");
        assert_eq!(client_addr(&headers, None), "-");
    }
}
