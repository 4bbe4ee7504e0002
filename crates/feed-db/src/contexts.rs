//! Context repository implementation.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use uuid::Uuid;

use feed_core::{Context, ContextRepository, Error, Result};

fn row_to_context(row: &PgRow) -> Context {
    Context {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}

/// PostgreSQL implementation of ContextRepository.
pub struct PgContextRepository {
    pool: Pool<Postgres>,
}

impl PgContextRepository {
    /// Create a new PgContextRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContextRepository for PgContextRepository {
    async fn find_by_title(&self, title: &str) -> Result<Option<Context>> {
        let row = sqlx::query(
            "SELECT id, title, description, created_at FROM contexts WHERE title = $1",
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(row_to_context))
    }

    async fn delete_links_for_post(&self, post_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM context_posts WHERE post_id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn link(&self, post_id: Uuid, context_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO context_posts (post_id, context_id) VALUES ($1, $2)
             ON CONFLICT (post_id, context_id) DO NOTHING",
        )
        .bind(post_id)
        .bind(context_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Context>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.title, c.description, c.created_at
            FROM context_posts cp
            JOIN contexts c ON c.id = cp.context_id
            WHERE cp.post_id = $1
            ORDER BY c.title
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(row_to_context).collect())
    }
}
