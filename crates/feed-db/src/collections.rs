//! Collection repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use uuid::Uuid;

use feed_core::{
    Collection, CollectionMembership, CollectionRepository, Error, NewCollection, Result,
};

use crate::write_error;

fn row_to_collection(row: &PgRow) -> Collection {
    Collection {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}

/// PostgreSQL implementation of CollectionRepository.
pub struct PgCollectionRepository {
    pool: Pool<Postgres>,
}

impl PgCollectionRepository {
    /// Create a new PgCollectionRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CollectionRepository for PgCollectionRepository {
    async fn find_by_title(&self, title: &str) -> Result<Option<Collection>> {
        let row = sqlx::query(
            "SELECT id, title, slug, description, created_at FROM collections WHERE title = $1",
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(row_to_collection))
    }

    async fn create(&self, req: NewCollection) -> Result<Collection> {
        let collection = Collection {
            id: Uuid::now_v7(),
            title: req.title,
            slug: req.slug,
            description: req.description,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO collections (id, title, slug, description, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(collection.id)
        .bind(&collection.title)
        .bind(&collection.slug)
        .bind(&collection.description)
        .bind(collection.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "collection"))?;

        Ok(collection)
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM collections WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn delete_links_for_post(&self, post_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM collection_posts WHERE post_id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn link(&self, post_id: Uuid, collection_id: Uuid, order: i32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO collection_posts (post_id, collection_id, "order") VALUES ($1, $2, $3)
            ON CONFLICT (post_id, collection_id) DO UPDATE SET "order" = EXCLUDED."order"
            "#,
        )
        .bind(post_id)
        .bind(collection_id)
        .bind(order)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CollectionMembership>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.title, c.slug, c.description, c.created_at, cp."order"
            FROM collection_posts cp
            JOIN collections c ON c.id = cp.collection_id
            WHERE cp.post_id = $1
            ORDER BY cp."order"
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .iter()
            .map(|row| CollectionMembership {
                collection: row_to_collection(row),
                order: row.get("order"),
            })
            .collect())
    }
}
