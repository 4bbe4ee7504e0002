//! Chapter repository implementation.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use uuid::Uuid;

use feed_core::{Chapter, ChapterRepository, Error, NewChapter, Result};

use crate::write_error;

fn row_to_chapter(row: &PgRow) -> Chapter {
    Chapter {
        id: row.get("id"),
        post_id: row.get("post_id"),
        title: row.get("title"),
        slug: row.get("slug"),
        permalink: row.get("permalink"),
        order: row.get("order"),
        parent_chapter: row.get("parent_chapter"),
    }
}

/// PostgreSQL implementation of ChapterRepository.
pub struct PgChapterRepository {
    pool: Pool<Postgres>,
}

impl PgChapterRepository {
    /// Create a new PgChapterRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChapterRepository for PgChapterRepository {
    async fn delete_for_post(&self, post_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM post_chapters WHERE post_id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn create(&self, req: NewChapter) -> Result<Chapter> {
        let chapter = Chapter {
            id: Uuid::now_v7(),
            permalink: req.permalink(),
            post_id: req.post_id,
            title: req.title,
            slug: req.slug,
            order: req.order,
            parent_chapter: req.parent_chapter,
        };

        sqlx::query(
            r#"
            INSERT INTO post_chapters (id, post_id, title, slug, permalink, "order", parent_chapter)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(chapter.id)
        .bind(chapter.post_id)
        .bind(&chapter.title)
        .bind(&chapter.slug)
        .bind(&chapter.permalink)
        .bind(chapter.order)
        .bind(chapter.parent_chapter)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "chapter"))?;

        Ok(chapter)
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM post_chapters WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Chapter>> {
        let rows = sqlx::query(
            r#"
            SELECT id, post_id, title, slug, permalink, "order", parent_chapter
            FROM post_chapters
            WHERE post_id = $1
            ORDER BY "order"
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(row_to_chapter).collect())
    }
}
