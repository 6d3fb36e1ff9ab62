//! In-app notifications.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{StoreError, StoreResult};
use crate::domain::{NewNotification, Notification};

const NOTIFICATION_COLUMNS: &str = "id, user_id, type, title, content, link_type, link_id, read, \
     delivered, delivery_method, created_at";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        notification_type: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        link_type: row.get(5)?,
        link_id: row.get(6)?,
        read: row.get(7)?,
        delivered: row.get(8)?,
        delivery_method: row.get(9)?,
        created_at: row.get(10)?,
    })
}

pub fn create_notification(conn: &Connection, input: &NewNotification) -> StoreResult<Notification> {
    conn.execute(
        "INSERT INTO notifications (user_id, type, title, content, link_type, link_id, read,
                                    delivered, delivery_method, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7, ?8)",
        params![
            input.user_id,
            input.notification_type,
            input.title,
            input.content,
            input.link_type,
            input.link_id,
            input.delivery_method,
            Utc::now(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_notification(conn, id)?.ok_or(StoreError::not_found("notification", id))
}

pub fn get_notification(conn: &Connection, id: i64) -> StoreResult<Option<Notification>> {
    let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], notification_from_row).optional()?)
}

/// Unread notifications, newest first.
pub fn list_unread(conn: &Connection, user_id: i64) -> StoreResult<Vec<Notification>> {
    let sql = format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE user_id = ?1 AND read = 0
         ORDER BY created_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([user_id], notification_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Marks one of the user's notifications read. Idempotent.
pub fn mark_read(conn: &Connection, user_id: i64, id: i64) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("notification", id));
    }
    Ok(())
}

/// Returns how many notifications changed.
pub fn mark_all_read(conn: &Connection, user_id: i64) -> StoreResult<usize> {
    Ok(conn.execute(
        "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
        [user_id],
    )?)
}
