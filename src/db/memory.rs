use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;

use super::entries::EntryStore;
use crate::models::daily_entry::{DailyEntry, NewEntry};

/// In-process store for development without Postgres, and for tests.
/// Contents are lost on restart.
#[derive(Default)]
pub struct MemoryEntryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    entries: Vec<DailyEntry>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert with an explicit date, for backfilling history in tests.
    #[cfg(test)]
    pub async fn create_on(&self, entry: NewEntry, entry_date: NaiveDate) -> DailyEntry {
        self.insert(entry, entry_date).await
    }

    #[cfg(test)]
    pub async fn count(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    async fn insert(&self, entry: NewEntry, entry_date: NaiveDate) -> DailyEntry {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;

        let stored = DailyEntry {
            id: inner.next_id,
            age: entry.age,
            screen_minutes: entry.screen_minutes,
            evening_usage: entry.evening_usage,
            guidance: entry.guidance,
            entry_date,
        };
        inner.entries.push(stored.clone());
        stored
    }
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn create(&self, entry: NewEntry) -> Result<DailyEntry, sqlx::Error> {
        Ok(self.insert(entry, Utc::now().date_naive()).await)
    }

    async fn get(&self, id: i64) -> Result<Option<DailyEntry>, sqlx::Error> {
        let inner = self.inner.read().await;
        Ok(inner.entries.iter().find(|e| e.id == id).cloned())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<DailyEntry>, sqlx::Error> {
        let inner = self.inner.read().await;
        let mut entries = inner.entries.clone();
        entries.sort_by(|a, b| b.entry_date.cmp(&a.entry_date).then(b.id.cmp(&a.id)));
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }

    async fn update_guidance(&self, id: i64, guidance: &str) -> Result<bool, sqlx::Error> {
        let mut inner = self.inner.write().await;
        match inner.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.guidance = guidance.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
