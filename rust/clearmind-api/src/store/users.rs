//! Users and workspaces.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{StoreError, StoreResult, optional_json_column, to_json_text};
use crate::domain::{
    NewWorkspace, NotificationSettings, Role, SensoryProfile, User, UserIdentity, Workspace,
};

const USER_COLUMNS: &str = "id, open_id, name, email, login_method, role, sensory_profile, \
     notification_settings, created_at, updated_at, last_signed_in";

const WORKSPACE_COLUMNS: &str = "id, name, icon, owner_id, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        open_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        login_method: row.get(4)?,
        role: row.get(5)?,
        sensory_profile: row.get(6)?,
        notification_settings: optional_json_column(row, 7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        last_signed_in: row.get(10)?,
    })
}

fn workspace_from_row(row: &Row<'_>) -> rusqlite::Result<Workspace> {
    Ok(Workspace {
        id: row.get(0)?,
        name: row.get(1)?,
        icon: row.get(2)?,
        owner_id: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Inserts or refreshes a user on login.
///
/// Profile fields are only overwritten when the identity provides them.
/// The configured owner is always (re)promoted to admin.
pub fn upsert_user(
    conn: &Connection,
    identity: &UserIdentity,
    owner_open_id: Option<&str>,
) -> StoreResult<User> {
    let now = Utc::now();
    let is_owner = owner_open_id.is_some_and(|owner| owner == identity.open_id);

    conn.execute(
        "INSERT INTO users (open_id, name, email, login_method, role, sensory_profile,
                            created_at, updated_at, last_signed_in)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?7)
         ON CONFLICT(open_id) DO UPDATE SET
             name = COALESCE(excluded.name, users.name),
             email = COALESCE(excluded.email, users.email),
             login_method = COALESCE(excluded.login_method, users.login_method),
             role = CASE WHEN ?8 THEN 'admin' ELSE users.role END,
             updated_at = excluded.updated_at,
             last_signed_in = excluded.last_signed_in",
        params![
            identity.open_id,
            identity.name,
            identity.email,
            identity.login_method,
            if is_owner { Role::Admin } else { Role::User },
            SensoryProfile::default(),
            now,
            is_owner,
        ],
    )?;

    get_user_by_open_id(conn, &identity.open_id)?
        .ok_or_else(|| StoreError::invalid("openId", "user vanished after upsert"))
}

pub fn get_user(conn: &Connection, id: i64) -> StoreResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], user_from_row).optional()?)
}

pub fn get_user_by_open_id(conn: &Connection, open_id: &str) -> StoreResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE open_id = ?1");
    Ok(conn.query_row(&sql, [open_id], user_from_row).optional()?)
}

pub fn update_sensory_profile(
    conn: &Connection,
    user_id: i64,
    profile: SensoryProfile,
) -> StoreResult<User> {
    let changed = conn.execute(
        "UPDATE users SET sensory_profile = ?1, updated_at = ?2 WHERE id = ?3",
        params![profile, Utc::now(), user_id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("user", user_id));
    }
    get_user(conn, user_id)?.ok_or(StoreError::not_found("user", user_id))
}

pub fn update_notification_settings(
    conn: &Connection,
    user_id: i64,
    settings: &NotificationSettings,
) -> StoreResult<User> {
    let changed = conn.execute(
        "UPDATE users SET notification_settings = ?1, updated_at = ?2 WHERE id = ?3",
        params![to_json_text(settings)?, Utc::now(), user_id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("user", user_id));
    }
    get_user(conn, user_id)?.ok_or(StoreError::not_found("user", user_id))
}

pub fn create_workspace(
    conn: &Connection,
    owner_id: i64,
    input: &NewWorkspace,
) -> StoreResult<Workspace> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO workspaces (name, icon, owner_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![input.name, input.icon, owner_id, now],
    )?;
    let id = conn.last_insert_rowid();
    get_workspace(conn, id)?.ok_or(StoreError::not_found("workspace", id))
}

pub fn get_workspace(conn: &Connection, id: i64) -> StoreResult<Option<Workspace>> {
    let sql = format!("SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], workspace_from_row).optional()?)
}

/// Workspaces owned by `owner_id`, oldest first.
pub fn list_workspaces_by_owner(conn: &Connection, owner_id: i64) -> StoreResult<Vec<Workspace>> {
    let sql = format!(
        "SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE owner_id = ?1 ORDER BY id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([owner_id], workspace_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Oldest workspace the user owns. User-scoped records (timeline events,
/// mood entries) raise their automation events here.
pub fn primary_workspace_id(conn: &Connection, owner_id: i64) -> StoreResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM workspaces WHERE owner_id = ?1 ORDER BY id ASC LIMIT 1",
            [owner_id],
            |row| row.get(0),
        )
        .optional()?)
}

/// Returns the user's first workspace, creating "<name>'s Workspace" if
/// they have none.
pub fn get_or_create_default_workspace(conn: &Connection, user: &User) -> StoreResult<Workspace> {
    if let Some(existing) = list_workspaces_by_owner(conn, user.id)?.into_iter().next() {
        return Ok(existing);
    }
    let name = user.name.as_deref().filter(|n| !n.trim().is_empty()).unwrap_or("My");
    create_workspace(
        conn,
        user.id,
        &NewWorkspace {
            name: format!("{name}'s Workspace"),
            icon: Some("🏠".to_string()),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support;

    fn identity(open_id: &str, name: Option<&str>) -> UserIdentity {
        UserIdentity {
            open_id: open_id.to_string(),
            name: name.map(String::from),
            email: None,
            login_method: Some("oauth".to_string()),
        }
    }

    #[test]
    fn upsert_keeps_profile_fields_not_provided() {
        let conn = test_support::conn();
        let first = upsert_user(&conn, &identity("abc", Some("Ada")), None).unwrap();
        assert_eq!(first.role, Role::User);
        assert_eq!(first.sensory_profile, SensoryProfile::Adhd);

        let again = upsert_user(&conn, &identity("abc", None), None).unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.name.as_deref(), Some("Ada"));
        assert!(again.last_signed_in >= first.last_signed_in);
    }

    #[test]
    fn owner_is_promoted_to_admin() {
        let conn = test_support::conn();
        let user = upsert_user(&conn, &identity("owner", None), None).unwrap();
        assert_eq!(user.role, Role::User);
        let user = upsert_user(&conn, &identity("owner", None), Some("owner")).unwrap();
        assert_eq!(user.role, Role::Admin);
        let other = upsert_user(&conn, &identity("guest", None), Some("owner")).unwrap();
        assert_eq!(other.role, Role::User);
    }

    #[test]
    fn default_workspace_is_created_once() {
        let conn = test_support::conn();
        let user = upsert_user(&conn, &identity("abc", Some("Ada")), None).unwrap();
        let ws = get_or_create_default_workspace(&conn, &user).unwrap();
        assert_eq!(ws.name, "Ada's Workspace");
        assert_eq!(ws.icon.as_deref(), Some("🏠"));
        let again = get_or_create_default_workspace(&conn, &user).unwrap();
        assert_eq!(again.id, ws.id);
        assert_eq!(list_workspaces_by_owner(&conn, user.id).unwrap().len(), 1);
    }

    #[test]
    fn preferences_are_persisted() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "abc");
        let updated = update_sensory_profile(&conn, user.id, SensoryProfile::LowStim).unwrap();
        assert_eq!(updated.sensory_profile, SensoryProfile::LowStim);

        let settings = NotificationSettings {
            email: true,
            push: false,
            quiet_hours: None,
        };
        let updated = update_notification_settings(&conn, user.id, &settings).unwrap();
        assert_eq!(updated.notification_settings, Some(settings));

        assert!(matches!(
            update_sensory_profile(&conn, 999, SensoryProfile::Standard),
            Err(StoreError::NotFound { .. })
        ));
    }
}
