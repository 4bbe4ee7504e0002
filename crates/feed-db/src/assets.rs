//! Asset repository: upload metadata in PostgreSQL, bytes in a storage backend.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use feed_core::{
    sanitize_filename, Asset, AssetRepository, AssetStore, Error, MediaType, NewAsset, Result,
};

use crate::file_storage::{storage_path, StorageBackend};

fn row_to_asset(row: &PgRow) -> Result<(Asset, String)> {
    let media_type: String = row.get("media_type");
    let asset = Asset {
        id: row.get("id"),
        file: row.get("file"),
        description: row.get("description"),
        media_type: media_type
            .parse::<MediaType>()
            .map_err(Error::Internal)?,
        content_type: row.get("content_type"),
        size_bytes: row.get("size_bytes"),
        source_url: row.get("source_url"),
        created_at: row.get("created_at"),
    };
    Ok((asset, row.get("storage_path")))
}

/// PostgreSQL + storage backend implementation of the asset traits.
pub struct PgAssetRepository {
    pool: Pool<Postgres>,
    backend: Arc<dyn StorageBackend>,
}

impl PgAssetRepository {
    /// Create a new PgAssetRepository with the given pool and byte store.
    pub fn new(pool: Pool<Postgres>, backend: Arc<dyn StorageBackend>) -> Self {
        Self { pool, backend }
    }

    async fn fetch_with_path(&self, id: Uuid) -> Result<Option<(Asset, String)>> {
        let row = sqlx::query(
            r#"
            SELECT id, file, description, media_type, content_type, size_bytes,
                   source_url, storage_path, created_at
            FROM uploads
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(row_to_asset).transpose()
    }
}

#[async_trait]
impl AssetStore for PgAssetRepository {
    async fn store(&self, req: NewAsset) -> Result<Asset> {
        let asset = Asset {
            id: Uuid::now_v7(),
            file: sanitize_filename(&req.filename),
            description: req.description,
            media_type: req.media_type,
            content_type: req.content_type,
            size_bytes: req.data.len() as i64,
            source_url: req.source_url,
            created_at: Utc::now(),
        };
        let path = storage_path(asset.id, &asset.file);

        self.backend.write(&path, &req.data).await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO uploads (id, file, description, media_type, content_type, size_bytes,
                                 source_url, storage_path, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(asset.id)
        .bind(&asset.file)
        .bind(&asset.description)
        .bind(asset.media_type.to_string())
        .bind(&asset.content_type)
        .bind(asset.size_bytes)
        .bind(&asset.source_url)
        .bind(&path)
        .bind(asset.created_at)
        .execute(&self.pool)
        .await;

        if let Err(e) = inserted {
            // Don't leave orphaned bytes behind
            if let Err(cleanup) = self.backend.delete(&path).await {
                warn!(storage_path = %path, error = %cleanup, "Failed to remove orphaned asset bytes");
            }
            return Err(Error::Database(e));
        }

        debug!(
            subsystem = "database",
            component = "assets",
            op = "store",
            asset_id = %asset.id,
            size_bytes = asset.size_bytes,
            "Stored asset"
        );
        Ok(asset)
    }
}

#[async_trait]
impl AssetRepository for PgAssetRepository {
    async fn fetch(&self, id: Uuid) -> Result<Option<Asset>> {
        Ok(self.fetch_with_path(id).await?.map(|(asset, _)| asset))
    }

    async fn read(&self, id: Uuid) -> Result<Option<(Asset, Vec<u8>)>> {
        let Some((asset, path)) = self.fetch_with_path(id).await? else {
            return Ok(None);
        };
        let data = self.backend.read(&path).await?;
        Ok(Some((asset, data)))
    }
}
