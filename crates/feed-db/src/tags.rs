//! Tag repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use feed_core::{Error, Result, Tag, TagRepository};

use crate::write_error;

/// PostgreSQL implementation of TagRepository.
pub struct PgTagRepository {
    pool: Pool<Postgres>,
}

impl PgTagRepository {
    /// Create a new PgTagRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagRepository for PgTagRepository {
    async fn find_by_title(&self, title: &str) -> Result<Option<Tag>> {
        let row = sqlx::query("SELECT id, title, created_at FROM tags WHERE title = $1")
            .bind(title)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|row| Tag {
            id: row.get("id"),
            title: row.get("title"),
            created_at: row.get("created_at"),
        }))
    }

    async fn create(&self, title: &str) -> Result<Tag> {
        let tag = Tag {
            id: Uuid::now_v7(),
            title: title.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO tags (id, title, created_at) VALUES ($1, $2, $3)")
            .bind(tag.id)
            .bind(&tag.title)
            .bind(tag.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "tag"))?;

        Ok(tag)
    }

    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<Tag>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT t.id, t.title, t.created_at
            FROM unnest($1::uuid[]) WITH ORDINALITY AS wanted(id, pos)
            JOIN tags t ON t.id = wanted.id
            ORDER BY wanted.pos
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| Tag {
                id: row.get("id"),
                title: row.get("title"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
