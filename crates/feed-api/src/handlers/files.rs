//! Managed asset upload and download.

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use feed_core::defaults::ASSET_DESCRIPTION;
use feed_core::{detect_content_type, Asset, MediaType, NewAsset};

use crate::error::ApiError;
use crate::AppState;

/// A stored asset and the URL it is served from.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub asset: Asset,
    pub url: String,
}

/// `POST /api/uploads`
///
/// Multipart fields: `file` (required), `description`, and `url` (the
/// source the bytes came from).
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut description: Option<String> = None;
    let mut source_url: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let claimed = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {}", e)))?
                    .to_vec();
                file = Some((filename, claimed, data));
            }
            Some("description") => {
                description = Some(field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read description: {}", e))
                })?);
            }
            Some("url") => {
                source_url = Some(field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read url: {}", e))
                })?);
            }
            _ => {}
        }
    }

    let (filename, claimed, data) = file.ok_or_else(|| {
        ApiError::BadRequest("No file uploaded. Use field name 'file'.".to_string())
    })?;
    if data.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }

    let asset = state
        .ingestor
        .repositories()
        .asset_store
        .store(NewAsset {
            content_type: detect_content_type(&filename, &data, claimed.as_deref()),
            media_type: MediaType::from_filename(&filename),
            filename,
            description: description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| ASSET_DESCRIPTION.to_string()),
            source_url: source_url.filter(|u| !u.trim().is_empty()),
            data,
        })
        .await?;

    info!(
        subsystem = "api",
        component = "uploads",
        asset_id = %asset.id,
        file = %asset.file,
        size_bytes = asset.size_bytes,
        "Asset uploaded"
    );

    let url = asset.url();
    Ok((StatusCode::CREATED, Json(UploadResponse { asset, url })))
}

/// `GET /api/files/uploads/:id/:filename`
pub async fn serve_file(
    State(state): State<AppState>,
    Path((id, filename)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let (asset, data) = state
        .ingestor
        .repositories()
        .assets
        .read(id)
        .await?
        .filter(|(asset, _)| asset.file == filename)
        .ok_or_else(|| ApiError::NotFound(format!("File {}/{} not found", id, filename)))?;

    let headers = [
        (header::CONTENT_TYPE, asset.content_type),
        (
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", asset.file),
        ),
        (
            header::CACHE_CONTROL,
            "public, max-age=31536000, immutable".to_string(),
        ),
    ];
    Ok((headers, data))
}
