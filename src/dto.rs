//! # CalmNest: Request/Response DTOs
//!
//! Conventions:
//! - `*Request`  → deserialized from client JSON body
//! - `*Response` / items → serialized to client JSON
//! - Range checks are expressed via `validator` derive macros

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::daily_entry::{DailyEntry, NewEntry};
use crate::services::llm::GuidanceRequest;

/// Most entries `GET /history` ever returns.
pub const HISTORY_LIMIT: i64 = 7;

// ============================================================================
// Guidance
// ============================================================================

/// POST /daily-guidance
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DailyGuidanceRequest {
    #[validate(range(min = 0, max = 18, message = "Age must be between 0 and 18"))]
    pub age: i32,

    #[validate(range(min = 0, max = 1440, message = "Screen minutes must be between 0 and 1440"))]
    pub screen_minutes: i32,

    pub evening_usage: bool,
}

impl DailyGuidanceRequest {
    pub fn into_new_entry(self, guidance: &str) -> NewEntry {
        NewEntry {
            age: self.age,
            screen_minutes: self.screen_minutes,
            evening_usage: self.evening_usage,
            guidance: guidance.to_string(),
        }
    }

    pub fn guidance_request(&self) -> GuidanceRequest {
        GuidanceRequest {
            age: self.age,
            screen_minutes: self.screen_minutes,
            evening_usage: self.evening_usage,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DailyGuidanceResponse {
    pub guidance: String,
}

// ============================================================================
// History
// ============================================================================

/// One row of GET /history. Ids and ages stay server-side.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryItem {
    pub entry_date: NaiveDate,
    pub screen_minutes: i32,
    pub evening_usage: bool,
    pub guidance: String,
}

impl From<DailyEntry> for HistoryItem {
    fn from(entry: DailyEntry) -> Self {
        Self {
            entry_date: entry.entry_date,
            screen_minutes: entry.screen_minutes,
            evening_usage: entry.evening_usage,
            guidance: entry.guidance,
        }
    }
}
