//! Timeline events.

use chrono::{DateTime, Days, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{StoreError, StoreResult};
use crate::domain::{EventUpdate, NewEvent, TimelineEvent};

const EVENT_COLUMNS: &str = "id, user_id, database_item_id, title, start_time, estimated_duration, \
     actual_duration, color, icon, completed, completed_at, created_at, updated_at";

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<TimelineEvent> {
    Ok(TimelineEvent {
        id: row.get(0)?,
        user_id: row.get(1)?,
        database_item_id: row.get(2)?,
        title: row.get(3)?,
        start_time: row.get(4)?,
        estimated_duration: row.get(5)?,
        actual_duration: row.get(6)?,
        color: row.get(7)?,
        icon: row.get(8)?,
        completed: row.get(9)?,
        completed_at: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Start and end of `date` in UTC, end exclusive.
pub(crate) fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    let end = start
        .checked_add_days(Days::new(1))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (start, end)
}

pub fn create_event(conn: &Connection, user_id: i64, input: &NewEvent) -> StoreResult<TimelineEvent> {
    if input.estimated_duration.is_some_and(|d| d < 0) {
        return Err(StoreError::invalid("estimatedDuration", "must not be negative"));
    }
    let now = Utc::now();
    conn.execute(
        "INSERT INTO timeline_events (user_id, database_item_id, title, start_time,
                                      estimated_duration, color, icon, completed,
                                      created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)",
        params![
            user_id,
            input.database_item_id,
            input.title,
            input.start_time,
            input.estimated_duration,
            input.color,
            input.icon,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_event(conn, id)?.ok_or(StoreError::not_found("event", id))
}

pub fn get_event(conn: &Connection, id: i64) -> StoreResult<Option<TimelineEvent>> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM timeline_events WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], event_from_row).optional()?)
}

/// The user's events starting within `[from, to)`, earliest first.
pub fn list_events_between(
    conn: &Connection,
    user_id: i64,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> StoreResult<Vec<TimelineEvent>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM timeline_events
         WHERE user_id = ?1 AND start_time >= ?2 AND start_time < ?3
         ORDER BY start_time ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id, from, to], event_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// The user's events on one UTC calendar day.
pub fn list_events_on_date(
    conn: &Connection,
    user_id: i64,
    date: NaiveDate,
) -> StoreResult<Vec<TimelineEvent>> {
    let (from, to) = day_bounds(date);
    list_events_between(conn, user_id, from, to)
}

/// Applies a partial update. Returns the event and whether this update
/// flipped it to completed.
pub fn update_event(
    conn: &Connection,
    id: i64,
    update: &EventUpdate,
) -> StoreResult<(TimelineEvent, bool)> {
    let mut event = get_event(conn, id)?.ok_or(StoreError::not_found("event", id))?;
    let now = Utc::now();

    if let Some(title) = &update.title {
        event.title.clone_from(title);
    }
    if let Some(start) = update.start_time {
        event.start_time = start;
    }
    if let Some(estimated) = update.estimated_duration {
        event.estimated_duration = estimated;
    }
    if let Some(actual) = update.actual_duration {
        event.actual_duration = actual;
    }
    if let Some(color) = &update.color {
        event.color.clone_from(color);
    }
    if let Some(icon) = &update.icon {
        event.icon.clone_from(icon);
    }
    let mut newly_completed = false;
    if let Some(completed) = update.completed {
        newly_completed = completed && !event.completed;
        event.completed = completed;
        event.completed_at = if completed {
            event.completed_at.or(Some(now))
        } else {
            None
        };
    }
    event.updated_at = now;

    conn.execute(
        "UPDATE timeline_events SET title = ?1, start_time = ?2, estimated_duration = ?3,
                actual_duration = ?4, color = ?5, icon = ?6, completed = ?7, completed_at = ?8,
                updated_at = ?9
         WHERE id = ?10",
        params![
            event.title,
            event.start_time,
            event.estimated_duration,
            event.actual_duration,
            event.color,
            event.icon,
            event.completed,
            event.completed_at,
            event.updated_at,
            id,
        ],
    )?;
    Ok((event, newly_completed))
}

pub fn delete_event(conn: &Connection, id: i64) -> StoreResult<()> {
    let changed = conn.execute("DELETE FROM timeline_events WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(StoreError::not_found("event", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support;
    use chrono::TimeZone;

    fn event_at(conn: &Connection, user_id: i64, title: &str, start: DateTime<Utc>) -> TimelineEvent {
        create_event(
            conn,
            user_id,
            &NewEvent {
                title: title.to_string(),
                start_time: start,
                database_item_id: None,
                estimated_duration: Some(30),
                color: None,
                icon: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn events_are_filtered_by_day() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u");
        let day = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        event_at(&conn, user.id, "late", Utc.with_ymd_and_hms(2025, 3, 14, 18, 0, 0).unwrap());
        event_at(&conn, user.id, "early", Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap());
        event_at(&conn, user.id, "next day", Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap());

        let other = test_support::user(&conn, "someone else");
        event_at(&conn, other.id, "not mine", Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap());

        let titles: Vec<String> = list_events_on_date(&conn, user.id, day)
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, ["early", "late"]);
    }

    #[test]
    fn completion_stamps_and_clears_completed_at() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u");
        let event = event_at(&conn, user.id, "Gym", Utc::now());

        let done = EventUpdate {
            completed: Some(true),
            ..EventUpdate::default()
        };
        let (completed, flipped) = update_event(&conn, event.id, &done).unwrap();
        assert!(flipped);
        assert!(completed.completed_at.is_some());

        let (_, flipped_again) = update_event(&conn, event.id, &done).unwrap();
        assert!(!flipped_again);

        let undo = EventUpdate {
            completed: Some(false),
            ..EventUpdate::default()
        };
        let (reopened, _) = update_event(&conn, event.id, &undo).unwrap();
        assert!(!reopened.completed);
        assert!(reopened.completed_at.is_none());
    }

    #[test]
    fn delete_reports_missing_event() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u");
        let event = event_at(&conn, user.id, "Call", Utc::now());
        delete_event(&conn, event.id).unwrap();
        assert!(matches!(delete_event(&conn, event.id), Err(StoreError::NotFound { .. })));
    }
}
