use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use crate::models::daily_entry::{DailyEntry, NewEntry};

/// Persistence for screen-time entries.
///
/// Every method is a single store operation; nothing here spans a transaction.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Insert a new entry dated today and return it with its assigned id.
    async fn create(&self, entry: NewEntry) -> Result<DailyEntry, sqlx::Error>;

    async fn get(&self, id: i64) -> Result<Option<DailyEntry>, sqlx::Error>;

    /// Newest first by `entry_date`, ties broken by descending id.
    async fn list_recent(&self, limit: i64) -> Result<Vec<DailyEntry>, sqlx::Error>;

    /// Overwrite the guidance text. Returns `false` when no such entry exists.
    async fn update_guidance(&self, id: i64, guidance: &str) -> Result<bool, sqlx::Error>;

    async fn ping(&self) -> Result<(), sqlx::Error>;

    /// Backend name for logging.
    fn backend(&self) -> &'static str;
}

pub struct PgEntryStore {
    db: PgPool,
}

impl PgEntryStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EntryStore for PgEntryStore {
    async fn create(&self, entry: NewEntry) -> Result<DailyEntry, sqlx::Error> {
        sqlx::query_as::<_, DailyEntry>(
            r#"
            INSERT INTO daily_entries (age, screen_minutes, evening_usage, guidance, entry_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, age, screen_minutes, evening_usage, guidance, entry_date
            "#,
        )
        .bind(entry.age)
        .bind(entry.screen_minutes)
        .bind(entry.evening_usage)
        .bind(&entry.guidance)
        .bind(Utc::now().date_naive())
        .fetch_one(&self.db)
        .await
    }

    async fn get(&self, id: i64) -> Result<Option<DailyEntry>, sqlx::Error> {
        sqlx::query_as::<_, DailyEntry>(
            r#"
            SELECT id, age, screen_minutes, evening_usage, guidance, entry_date
            FROM daily_entries
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<DailyEntry>, sqlx::Error> {
        sqlx::query_as::<_, DailyEntry>(
            r#"
            SELECT id, age, screen_minutes, evening_usage, guidance, entry_date
            FROM daily_entries
            ORDER BY entry_date DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
    }

    async fn update_guidance(&self, id: i64, guidance: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE daily_entries SET guidance = $2 WHERE id = $1")
            .bind(id)
            .bind(guidance)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.db)
            .await
            .map(|_| ())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
