//! Route handlers.

pub mod files;
pub mod posts;

use axum::response::IntoResponse;
use axum::Json;

pub use files::{serve_file, upload_file};
pub use posts::{create_post, update_post};

/// Liveness probe.
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
