//! API Middleware
//!
//! Actor identity extraction and request logging. Authentication itself is
//! done by the upstream gateway, which forwards the caller as `X-Actor-*`
//! headers.

use axum::{
    body::Body,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::domain::ActorContext;
use crate::error::AppError;

pub const ACTOR_USER_HEADER: &str = "x-actor-user-id";
pub const ACTOR_MEMBER_HEADER: &str = "x-actor-member-id";
pub const ACTOR_ROLES_HEADER: &str = "x-actor-roles";
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Role granting admin operations.
pub const ADMIN_ROLE: &str = "admin";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Build the caller's [`ActorContext`] from gateway headers.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<ActorContext, AppError> {
    let user_id = header_str(headers, ACTOR_USER_HEADER)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or(AppError::Unauthenticated)?;

    let mut actor = ActorContext::new(user_id);

    if let Some(raw) = header_str(headers, ACTOR_MEMBER_HEADER) {
        let member_id = Uuid::parse_str(raw).map_err(|_| {
            AppError::Validation("invalid X-Actor-Member-Id header format".to_string())
        })?;
        actor = actor.with_member(member_id);
    }

    let is_admin = header_str(headers, ACTOR_ROLES_HEADER)
        .map(|roles| {
            roles
                .split(',')
                .any(|r| r.trim().eq_ignore_ascii_case(ADMIN_ROLE))
        })
        .unwrap_or(false);
    if is_admin {
        actor = actor.as_admin();
    }

    // an unparsable correlation id is replaced rather than rejected
    if let Some(correlation_id) =
        header_str(headers, CORRELATION_HEADER).and_then(|s| Uuid::parse_str(s).ok())
    {
        actor = actor.with_correlation_id(correlation_id);
    }
    actor.ensure_correlation_id();

    Ok(actor)
}

// =========================================================================
// Actor Middleware
// =========================================================================

/// Attach the caller's [`ActorContext`] to the request, or answer 401.
pub async fn actor_middleware(mut request: Request<Body>, next: Next) -> Result<Response, AppError> {
    let actor = actor_from_headers(request.headers())?;
    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

// =========================================================================
// mask_headers_for_logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-api-key"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

// =========================================================================
// Request Logging Middleware
// =========================================================================

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let version = request.version();

    let headers = mask_headers_for_logging(request.headers());
    let correlation_id = header_str(request.headers(), CORRELATION_HEADER).map(str::to_string);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        version = ?version,
        correlation_id = ?correlation_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}
