use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One stored guidance request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DailyEntry {
    pub id: i64,
    pub age: i32,
    pub screen_minutes: i32,
    pub evening_usage: bool,
    pub guidance: String,
    pub entry_date: NaiveDate,
}

/// Fields supplied on creation; `id` and `entry_date` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub age: i32,
    pub screen_minutes: i32,
    pub evening_usage: bool,
    pub guidance: String,
}
