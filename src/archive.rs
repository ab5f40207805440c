//! Day-keyed archive of immutable daily snapshots.
//!
//! The day key is the calendar date in a fixed local offset; all equality,
//! sorting and range queries go through it. The archive holds at most one
//! snapshot per day, newest first, enforced by upsert.

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};
use uuid::Uuid;

use crate::meal::MealEntry;
use crate::mood::MoodState;

/// Projects a timestamp into `offset` and truncates to the calendar date.
pub fn day_key(timestamp: OffsetDateTime, offset: UtcOffset) -> Date {
    timestamp.to_offset(offset).date()
}

/// Local calendar offset, resolved once at startup; falls back to UTC when
/// the platform offset is unavailable.
pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// `yyyy-MM-dd` rendering; used as the cloud document id.
pub fn day_key_string(date: Date) -> String {
    let format = format_description!("[year]-[month]-[day]");
    date.format(&format)
        .unwrap_or_else(|_| date.to_string())
}

/// Immutable record of one calendar day. Replaced wholesale on update, never
/// patched in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub id: Uuid,
    pub date: Date,
    pub mood_state: MoodState,
    pub meals: Vec<MealEntry>,
    pub meal_count: usize,
    pub average_health_score: f64,
}

impl DailySnapshot {
    pub fn new(date: Date, mood_state: MoodState, meals: Vec<MealEntry>) -> Self {
        let average_health_score = if meals.is_empty() {
            0.5
        } else {
            meals.iter().map(|m| m.health_score).sum::<f64>() / meals.len() as f64
        };
        Self {
            id: Uuid::new_v4(),
            date,
            mood_state,
            meal_count: meals.len(),
            average_health_score,
            meals,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalArchive {
    pub snapshots: Vec<DailySnapshot>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub last_sync_date: Option<OffsetDateTime>,
}

impl HistoricalArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any snapshot for the same day, then restores descending date
    /// order. The day is the natural key.
    pub fn upsert(&mut self, snapshot: DailySnapshot) {
        self.snapshots.retain(|existing| existing.date != snapshot.date);
        self.snapshots.push(snapshot);
        self.snapshots.sort_by(|a, b| b.date.cmp(&a.date));
    }

    pub fn get(&self, date: Date) -> Option<&DailySnapshot> {
        self.snapshots.iter().find(|s| s.date == date)
    }

    /// Snapshots whose day falls in `[start, end]`, newest first. An inverted
    /// range is a programmer error; release builds return empty.
    pub fn range(&self, start: Date, end: Date) -> Vec<&DailySnapshot> {
        debug_assert!(start <= end, "inverted archive range");
        if start > end {
            return Vec::new();
        }
        self.snapshots
            .iter()
            .filter(|s| s.date >= start && s.date <= end)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
