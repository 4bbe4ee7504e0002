//! Markdown post submission.
//!
//! The request body is the raw document (frontmatter plus markdown), sent
//! with any content type.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use feed_core::defaults::POST_PROCESSED_MESSAGE;
use feed_core::PostView;
use feed_ingest::{IngestOutcome, Submission};

use crate::error::ApiError;
use crate::AppState;

/// Response body for post submissions.
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub post: PostView,
    pub message: String,
    /// Steps that degraded without failing the submission.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl From<IngestOutcome> for PostResponse {
    fn from(outcome: IngestOutcome) -> Self {
        Self {
            warnings: outcome.report.warnings(),
            post: outcome.post,
            message: POST_PROCESSED_MESSAGE.to_string(),
        }
    }
}

/// `POST /api/markdown/posts`
pub async fn create_post(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let outcome = state.ingestor.submit(&body, Submission::Create).await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// `PUT /api/markdown/posts/:id`
pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<PostResponse>, ApiError> {
    let outcome = state.ingestor.submit(&body, Submission::Update(id)).await?;
    Ok(Json(outcome.into()))
}
