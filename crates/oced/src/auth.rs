//! Bearer key check for the API routes.
//!
//! Active only when `server.api_key` is configured. `/health` is mounted
//! outside this layer and never asks for a key.

use crate::routes::ApiError;
use crate::server::AppState;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::warn;

/// Error code for a missing bearer token
pub const CODE_UNAUTHORIZED: i32 = -32001;

/// Error code for a token that does not match
pub const CODE_FORBIDDEN: i32 = -32003;

/// Token from an `Authorization: Bearer <token>` header
fn bearer_token(request: &Request) -> Option<&str> {
    let value = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Mask token for logging (show first 4 chars only)
fn mask_token(token: &str) -> String {
    match token.get(..4) {
        Some(prefix) if token.len() > 8 => format!("{}...", prefix),
        _ => "***".to_string(),
    }
}

/// Compare without short-circuiting on the first differing byte
fn tokens_match(given: &str, expected: &str) -> bool {
    let (a, b) = (given.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };

    let token = bearer_token(&request).map(str::to_string);
    match token.as_deref() {
        None => {
            warn!("Rejected {} {}: missing bearer token", request.method(), request.uri().path());
            ApiError::new(StatusCode::UNAUTHORIZED, CODE_UNAUTHORIZED, "Missing bearer token")
                .into_response()
        }
        Some(token) if !tokens_match(token, expected) => {
            warn!(
                "Rejected {} {}: invalid token {}",
                request.method(),
                request.uri().path(),
                mask_token(token)
            );
            ApiError::new(StatusCode::FORBIDDEN, CODE_FORBIDDEN, "Invalid token").into_response()
        }
        Some(_) => next.run(request).await,
    }
}
