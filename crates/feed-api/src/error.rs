//! API error type and its JSON rendering.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::error;

use feed_ingest::IngestError;

/// Errors returned by handlers, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Internal(feed_core::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
}

impl From<feed_core::Error> for ApiError {
    fn from(err: feed_core::Error) -> Self {
        match &err {
            feed_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            feed_core::Error::PostNotFound(id) => ApiError::NotFound(format!("Post {} not found", id)),
            feed_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            feed_core::Error::MalformedFrontmatter(_)
            | feed_core::Error::InvalidMetadataEncoding(_) => ApiError::BadRequest(err.to_string()),
            _ if err.is_conflict() => ApiError::Conflict(err.to_string()),
            _ => ApiError::Internal(err),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::BadInput(msg) => ApiError::BadRequest(msg),
            IngestError::NotFound(id) => ApiError::NotFound(format!("Post {} not found", id)),
            IngestError::Persistence(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Internal(err) => {
                error!(error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
