//! Platform accounts and the crosspost queue.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use uuid::Uuid;

use feed_core::{
    CrosspostEntry, CrosspostRepository, Error, NewCrosspostEntry, Platform, PlatformAccount,
    QueueStatus, Result,
};

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    row.get::<String, _>(column).parse().map_err(Error::Internal)
}

fn row_to_entry(row: &PgRow) -> Result<CrosspostEntry> {
    Ok(CrosspostEntry {
        id: row.get("id"),
        post_id: row.get("post_id"),
        platform: parse_column(row, "platform")?,
        kind: parse_column(row, "kind")?,
        status: parse_column(row, "status")?,
        account_id: row.get("account_id"),
        created_at: row.get("created_at"),
    })
}

/// PostgreSQL implementation of CrosspostRepository.
pub struct PgCrosspostRepository {
    pool: Pool<Postgres>,
}

impl PgCrosspostRepository {
    /// Create a new PgCrosspostRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Register an account on a platform.
    pub async fn add_account(&self, platform: Platform, handle: &str) -> Result<PlatformAccount> {
        let account = PlatformAccount {
            id: Uuid::now_v7(),
            platform,
            handle: handle.to_string(),
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO platform_accounts (id, platform, handle, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(account.id)
        .bind(account.platform.to_string())
        .bind(&account.handle)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(account)
    }
}

#[async_trait]
impl CrosspostRepository for PgCrosspostRepository {
    async fn latest_account(&self, platform: Platform) -> Result<Option<PlatformAccount>> {
        let row = sqlx::query(
            r#"
            SELECT id, platform, handle, created_at
            FROM platform_accounts
            WHERE platform = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(platform.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(|row| {
            Ok(PlatformAccount {
                id: row.get("id"),
                platform: parse_column(&row, "platform")?,
                handle: row.get("handle"),
                created_at: row.get("created_at"),
            })
        })
        .transpose()
    }

    async fn enqueue(&self, req: NewCrosspostEntry) -> Result<CrosspostEntry> {
        let entry = CrosspostEntry {
            id: Uuid::now_v7(),
            post_id: req.post_id,
            platform: req.platform,
            kind: req.kind,
            status: QueueStatus::Queued,
            account_id: req.account_id,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO crosspost_queue (id, post_id, platform, kind, status, account_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(entry.post_id)
        .bind(entry.platform.to_string())
        .bind(entry.kind.to_string())
        .bind(entry.status.to_string())
        .bind(entry.account_id)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(entry)
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CrosspostEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, post_id, platform, kind, status, account_id, created_at
            FROM crosspost_queue
            WHERE post_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(row_to_entry).collect()
    }
}
