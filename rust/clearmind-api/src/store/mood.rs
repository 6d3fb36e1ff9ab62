//! Mood entries.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{StoreError, StoreResult};
use crate::domain::{DailyMood, MoodEntry, MoodSummary, NewMoodEntry};

const MOOD_COLUMNS: &str =
    "id, user_id, timestamp, mood_value, mood_emoji, notes, linked_event_id, created_at";

/// Window used by the "recent" listing, in days.
pub const RECENT_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_RECENT_LIMIT: usize = 30;

fn mood_from_row(row: &Row<'_>) -> rusqlite::Result<MoodEntry> {
    Ok(MoodEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        timestamp: row.get(2)?,
        mood_value: row.get(3)?,
        mood_emoji: row.get(4)?,
        notes: row.get(5)?,
        linked_event_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn create_mood_entry(
    conn: &Connection,
    user_id: i64,
    input: &NewMoodEntry,
) -> StoreResult<MoodEntry> {
    input
        .validate()
        .map_err(|reason| StoreError::invalid("moodValue", reason))?;
    let now = Utc::now();
    conn.execute(
        "INSERT INTO mood_entries (user_id, timestamp, mood_value, mood_emoji, notes,
                                   linked_event_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?2)",
        params![
            user_id,
            now,
            input.mood_value,
            input.mood_emoji,
            input.notes,
            input.linked_event_id,
        ],
    )?;
    let id = conn.last_insert_rowid();
    let sql = format!("SELECT {MOOD_COLUMNS} FROM mood_entries WHERE id = ?1");
    conn.query_row(&sql, [id], mood_from_row)
        .optional()?
        .ok_or(StoreError::not_found("mood entry", id))
}

/// Entries with `from <= timestamp <= to`, newest first.
pub fn list_mood_entries(
    conn: &Connection,
    user_id: i64,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> StoreResult<Vec<MoodEntry>> {
    let sql = format!(
        "SELECT {MOOD_COLUMNS} FROM mood_entries
         WHERE user_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3
         ORDER BY timestamp DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id, from, to], mood_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Up to `limit` entries from the last 30 days, newest first.
pub fn list_recent_mood(
    conn: &Connection,
    user_id: i64,
    limit: usize,
) -> StoreResult<Vec<MoodEntry>> {
    let now = Utc::now();
    let mut entries = list_mood_entries(
        conn,
        user_id,
        now - Duration::days(RECENT_WINDOW_DAYS),
        now,
    )?;
    entries.truncate(limit);
    Ok(entries)
}

/// Averages over the last `days` days, grouped by UTC date.
pub fn mood_summary(conn: &Connection, user_id: i64, days: i64) -> StoreResult<MoodSummary> {
    let now = Utc::now();
    let entries = list_mood_entries(
        conn,
        user_id,
        now - Duration::days(days.max(1)),
        now,
    )?;
    Ok(summarize(&entries))
}

pub(crate) fn summarize(entries: &[MoodEntry]) -> MoodSummary {
    fn average(values: &[i64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss, reason = "mood values are single digits")]
        let avg = values.iter().sum::<i64>() as f64 / values.len() as f64;
        Some((avg * 100.0).round() / 100.0)
    }

    let mut by_day: BTreeMap<NaiveDate, (usize, Vec<i64>)> = BTreeMap::new();
    let mut all_values = Vec::new();
    for entry in entries {
        let slot = by_day.entry(entry.timestamp.date_naive()).or_default();
        slot.0 += 1;
        if let Some(value) = entry.mood_value {
            slot.1.push(value);
            all_values.push(value);
        }
    }

    MoodSummary {
        count: entries.len(),
        average: average(&all_values),
        days: by_day
            .into_iter()
            .map(|(date, (count, values))| DailyMood {
                date,
                count,
                average: average(&values),
            })
            .collect(),
    }
}
