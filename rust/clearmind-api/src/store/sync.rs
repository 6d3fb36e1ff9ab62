//! Sync metadata: per-user, per-entity version counters.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{StoreError, StoreResult};
use crate::domain::{SyncEntity, SyncMetadata};

const SYNC_COLUMNS: &str = "id, user_id, entity_type, entity_id, last_synced_at, version, content_hash";

fn metadata_from_row(row: &Row<'_>) -> rusqlite::Result<SyncMetadata> {
    Ok(SyncMetadata {
        id: row.get(0)?,
        user_id: row.get(1)?,
        entity_type: row.get(2)?,
        entity_id: row.get(3)?,
        last_synced_at: row.get(4)?,
        version: row.get(5)?,
        content_hash: row.get(6)?,
    })
}

pub fn get_sync_metadata(
    conn: &Connection,
    user_id: i64,
    entity_type: SyncEntity,
    entity_id: i64,
) -> StoreResult<Option<SyncMetadata>> {
    let sql = format!(
        "SELECT {SYNC_COLUMNS} FROM sync_metadata
         WHERE user_id = ?1 AND entity_type = ?2 AND entity_id = ?3"
    );
    Ok(conn
        .query_row(&sql, params![user_id, entity_type, entity_id], metadata_from_row)
        .optional()?)
}

/// Upserts the entity's metadata, bumping its version. A first record
/// starts at version 1.
pub fn record_sync(
    conn: &Connection,
    user_id: i64,
    entity_type: SyncEntity,
    entity_id: i64,
    content_hash: Option<&str>,
) -> StoreResult<SyncMetadata> {
    conn.execute(
        "INSERT INTO sync_metadata (user_id, entity_type, entity_id, last_synced_at, version,
                                    content_hash)
         VALUES (?1, ?2, ?3, ?4, 1, ?5)
         ON CONFLICT(user_id, entity_type, entity_id) DO UPDATE SET
             version = sync_metadata.version + 1,
             last_synced_at = excluded.last_synced_at,
             content_hash = excluded.content_hash",
        params![user_id, entity_type, entity_id, Utc::now(), content_hash],
    )?;
    get_sync_metadata(conn, user_id, entity_type, entity_id)?
        .ok_or(StoreError::not_found("sync metadata", entity_id))
}

/// The user's metadata synced strictly after `since`, oldest first.
pub fn list_sync_since(
    conn: &Connection,
    user_id: i64,
    since: DateTime<Utc>,
) -> StoreResult<Vec<SyncMetadata>> {
    let sql = format!(
        "SELECT {SYNC_COLUMNS} FROM sync_metadata
         WHERE user_id = ?1 AND last_synced_at > ?2
         ORDER BY last_synced_at ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id, since], metadata_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support;
    use chrono::Duration;

    #[test]
    fn versions_increase_per_entity() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u");

        let first = record_sync(&conn, user.id, SyncEntity::Page, 1, Some("aa")).unwrap();
        assert_eq!(first.version, 1);
        let second = record_sync(&conn, user.id, SyncEntity::Page, 1, Some("bb")).unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(second.content_hash.as_deref(), Some("bb"));

        let other = record_sync(&conn, user.id, SyncEntity::Block, 1, None).unwrap();
        assert_eq!(other.version, 1);
        assert!(get_sync_metadata(&conn, user.id, SyncEntity::TimelineEvent, 1)
            .unwrap()
            .is_none());
    }

    #[test]
    fn changes_since_filters_by_time() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u");
        let before = Utc::now() - Duration::seconds(1);
        record_sync(&conn, user.id, SyncEntity::DatabaseItem, 4, None).unwrap();

        assert_eq!(list_sync_since(&conn, user.id, before).unwrap().len(), 1);
        let later = Utc::now() + Duration::seconds(1);
        assert!(list_sync_since(&conn, user.id, later).unwrap().is_empty());
    }
}
