//! Post repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use uuid::Uuid;

use feed_core::{Error, Post, PostRepository, Result};

use crate::write_error;

const POST_COLUMNS: &str = "id, title, subtitle, slug, permalink, content, is_visible, summary, \
                            featured_image, tag_ids, upload_ids, created_at, updated_at";

fn row_to_post(row: &PgRow) -> Post {
    Post {
        id: row.get("id"),
        title: row.get("title"),
        subtitle: row.get("subtitle"),
        slug: row.get("slug"),
        permalink: row.get("permalink"),
        content: row.get("content"),
        is_visible: row.get("is_visible"),
        summary: row.get("summary"),
        featured_image: row.get("featured_image"),
        tags: row.get("tag_ids"),
        uploads: row.get("upload_ids"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// PostgreSQL implementation of PostRepository.
pub struct PgPostRepository {
    pool: Pool<Postgres>,
}

impl PgPostRepository {
    /// Create a new PgPostRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn set_id_array(&self, post_id: Uuid, column: &str, ids: &[Uuid]) -> Result<()> {
        let sql = format!(
            "UPDATE posts SET {} = $2, updated_at = $3 WHERE id = $1",
            column
        );
        let result = sqlx::query(&sql)
            .bind(post_id)
            .bind(ids)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::PostNotFound(post_id));
        }
        Ok(())
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn fetch(&self, id: Uuid) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(row_to_post))
    }

    async fn save(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, title, subtitle, slug, permalink, content, is_visible,
                               summary, featured_image, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                subtitle = EXCLUDED.subtitle,
                slug = EXCLUDED.slug,
                permalink = EXCLUDED.permalink,
                content = EXCLUDED.content,
                is_visible = EXCLUDED.is_visible,
                summary = EXCLUDED.summary,
                featured_image = EXCLUDED.featured_image,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.subtitle)
        .bind(&post.slug)
        .bind(&post.permalink)
        .bind(&post.content)
        .bind(post.is_visible)
        .bind(&post.summary)
        .bind(post.featured_image)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "post"))?;
        Ok(())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM posts WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn permalink_exists(&self, permalink: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM posts WHERE permalink = $1)")
            .bind(permalink)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn set_tags(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
        self.set_id_array(post_id, "tag_ids", tag_ids).await
    }

    async fn set_uploads(&self, post_id: Uuid, asset_ids: &[Uuid]) -> Result<()> {
        self.set_id_array(post_id, "upload_ids", asset_ids).await
    }
}
