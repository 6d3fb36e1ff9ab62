//! Timeline events and mood entries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::double_option;

/// A scheduled block of time on the visual timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub id: i64,
    pub user_id: i64,
    pub database_item_id: Option<i64>,
    pub title: String,
    pub start_time: DateTime<Utc>,
    /// Minutes.
    pub estimated_duration: Option<i64>,
    /// Minutes.
    pub actual_duration: Option<i64>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub database_item_id: Option<i64>,
    #[serde(default)]
    pub estimated_duration: Option<i64>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub estimated_duration: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub actual_duration: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub color: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
    /// `true` stamps `completedAt`, `false` clears it.
    #[serde(default)]
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodEntry {
    pub id: i64,
    pub user_id: i64,
    pub timestamp: DateTime<Utc>,
    /// 1 (low) to 5 (great).
    pub mood_value: Option<i64>,
    pub mood_emoji: Option<String>,
    pub notes: Option<String>,
    pub linked_event_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMoodEntry {
    #[serde(default)]
    pub mood_value: Option<i64>,
    #[serde(default)]
    pub mood_emoji: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub linked_event_id: Option<i64>,
}

impl NewMoodEntry {
    pub const MIN_VALUE: i64 = 1;
    pub const MAX_VALUE: i64 = 5;

    /// Checks the mood value range.
    pub fn validate(&self) -> Result<(), String> {
        match self.mood_value {
            Some(v) if !(Self::MIN_VALUE..=Self::MAX_VALUE).contains(&v) => Err(format!(
                "moodValue must be between {} and {}, got {v}",
                Self::MIN_VALUE,
                Self::MAX_VALUE
            )),
            _ => Ok(()),
        }
    }
}

/// Aggregated mood over a window of days.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodSummary {
    pub count: usize,
    pub average: Option<f64>,
    pub days: Vec<DailyMood>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyMood {
    pub date: NaiveDate,
    pub count: usize,
    pub average: Option<f64>,
}
