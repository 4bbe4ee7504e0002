//! Optional static bearer token gate.
//!
//! When the server has no token configured, callers are assumed to be
//! authenticated upstream and every request passes.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::Json;
use tracing::warn;

use crate::AppState;

/// Extract the bearer token from an `Authorization` header value.
pub fn bearer_token(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Reject requests that don't carry the configured bearer token.
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if let Some(expected) = state.api_token.as_deref() {
        let presented = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token);

        if presented != Some(expected) {
            warn!(
                path = %request.uri().path(),
                has_token = presented.is_some(),
                "Rejected unauthenticated request"
            );
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "error": "missing or invalid bearer token"
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}
