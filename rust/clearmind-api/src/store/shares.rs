//! Page shares: per-user grants and public links.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use super::{StoreError, StoreResult};
use crate::domain::{NewShare, PageShare, ShareUpdate};

const SHARE_COLUMNS: &str = "id, page_id, user_id, permission, share_token, password_hash, \
     enabled, created_by, created_at, updated_at";

fn share_from_row(row: &Row<'_>) -> rusqlite::Result<PageShare> {
    let password_hash: Option<String> = row.get(5)?;
    Ok(PageShare {
        id: row.get(0)?,
        page_id: row.get(1)?,
        user_id: row.get(2)?,
        permission: row.get(3)?,
        share_token: row.get(4)?,
        password_protected: password_hash.is_some(),
        password_hash,
        enabled: row.get(6)?,
        created_by: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Argon2id hash in PHC string format.
pub fn hash_password(password: &str) -> StoreResult<String> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
        .map_err(|e| StoreError::invalid("password", e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::invalid("password", e.to_string()))
}

/// Checks `password` against the share. Shares without a password accept
/// anything.
pub fn verify_share_password(share: &PageShare, password: Option<&str>) -> bool {
    let Some(stored) = share.password_hash.as_deref() else {
        return true;
    };
    let Some(password) = password else {
        return false;
    };
    PasswordHash::new(stored).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Creates a grant for `input.user_id`, or a public link with a fresh
/// token when no user is given.
pub fn create_share(
    conn: &Connection,
    page_id: i64,
    created_by: i64,
    input: &NewShare,
) -> StoreResult<PageShare> {
    let token = input.user_id.is_none().then(new_token);
    let password_hash = match input.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };
    let now = Utc::now();
    conn.execute(
        "INSERT INTO page_shares (page_id, user_id, permission, share_token, password_hash,
                                  enabled, created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?7)",
        params![
            page_id,
            input.user_id,
            input.permission,
            token,
            password_hash,
            created_by,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_share(conn, id)?.ok_or(StoreError::not_found("share", id))
}

pub fn get_share(conn: &Connection, id: i64) -> StoreResult<Option<PageShare>> {
    let sql = format!("SELECT {SHARE_COLUMNS} FROM page_shares WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], share_from_row).optional()?)
}

pub fn list_shares_for_page(conn: &Connection, page_id: i64) -> StoreResult<Vec<PageShare>> {
    let sql = format!("SELECT {SHARE_COLUMNS} FROM page_shares WHERE page_id = ?1 ORDER BY id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([page_id], share_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Enabled public link for `token`.
pub fn get_share_by_token(conn: &Connection, token: &str) -> StoreResult<Option<PageShare>> {
    let sql = format!(
        "SELECT {SHARE_COLUMNS} FROM page_shares WHERE share_token = ?1 AND enabled = 1"
    );
    Ok(conn.query_row(&sql, [token], share_from_row).optional()?)
}

/// Strongest enabled grant the user holds on a page.
pub fn find_user_share(
    conn: &Connection,
    page_id: i64,
    user_id: i64,
) -> StoreResult<Option<PageShare>> {
    let sql = format!(
        "SELECT {SHARE_COLUMNS} FROM page_shares
         WHERE page_id = ?1 AND user_id = ?2 AND enabled = 1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![page_id, user_id], share_from_row)?;
    let shares = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(shares.into_iter().reduce(|best, share| {
        if share.permission.allows(best.permission) {
            share
        } else {
            best
        }
    }))
}

pub fn update_share(conn: &Connection, id: i64, update: &ShareUpdate) -> StoreResult<PageShare> {
    let mut share = get_share(conn, id)?.ok_or(StoreError::not_found("share", id))?;

    if let Some(permission) = update.permission {
        share.permission = permission;
    }
    if let Some(enabled) = update.enabled {
        share.enabled = enabled;
    }
    if let Some(password) = &update.password {
        share.password_hash = match password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };
        share.password_protected = share.password_hash.is_some();
    }
    share.updated_at = Utc::now();

    conn.execute(
        "UPDATE page_shares SET permission = ?1, enabled = ?2, password_hash = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            share.permission,
            share.enabled,
            share.password_hash,
            share.updated_at,
            id,
        ],
    )?;
    Ok(share)
}

pub fn delete_share(conn: &Connection, id: i64) -> StoreResult<()> {
    let changed = conn.execute("DELETE FROM page_shares WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(StoreError::not_found("share", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SharePermission;
    use crate::store::test_support;

    #[test]
    fn public_links_get_a_token_and_verify_passwords() {
        let conn = test_support::conn();
        let owner = test_support::user(&conn, "owner");
        let ws = test_support::workspace(&conn, &owner);
        let page = test_support::page(&conn, &ws, None, "Shared");

        let link = create_share(
            &conn,
            page.id,
            owner.id,
            &NewShare {
                user_id: None,
                permission: SharePermission::View,
                password: Some("hunter2".to_string()),
            },
        )
        .unwrap();
        let token = link.share_token.clone().unwrap();
        assert!(link.password_protected);

        let found = get_share_by_token(&conn, &token).unwrap().unwrap();
        assert!(verify_share_password(&found, Some("hunter2")));
        assert!(!verify_share_password(&found, Some("wrong")));
        assert!(!verify_share_password(&found, None));

        let serialized = serde_json::to_value(&found).unwrap();
        assert!(serialized.get("passwordHash").is_none());

        let opened = update_share(
            &conn,
            link.id,
            &ShareUpdate {
                password: Some(None),
                ..ShareUpdate::default()
            },
        )
        .unwrap();
        assert!(!opened.password_protected);
        assert!(verify_share_password(&opened, None));

        update_share(
            &conn,
            link.id,
            &ShareUpdate {
                enabled: Some(false),
                ..ShareUpdate::default()
            },
        )
        .unwrap();
        assert!(get_share_by_token(&conn, &token).unwrap().is_none());
    }

    #[test]
    fn user_share_lookup_returns_strongest_grant() {
        let conn = test_support::conn();
        let owner = test_support::user(&conn, "owner");
        let guest = test_support::user(&conn, "guest");
        let ws = test_support::workspace(&conn, &owner);
        let page = test_support::page(&conn, &ws, None, "Shared");

        for permission in [SharePermission::View, SharePermission::Edit] {
            let share = create_share(
                &conn,
                page.id,
                owner.id,
                &NewShare {
                    user_id: Some(guest.id),
                    permission,
                    password: None,
                },
            )
            .unwrap();
            assert!(share.share_token.is_none());
        }

        let best = find_user_share(&conn, page.id, guest.id).unwrap().unwrap();
        assert_eq!(best.permission, SharePermission::Edit);
        assert!(find_user_share(&conn, page.id, owner.id).unwrap().is_none());
        assert_eq!(list_shares_for_page(&conn, page.id).unwrap().len(), 2);

        delete_share(&conn, best.id).unwrap();
        let remaining = find_user_share(&conn, page.id, guest.id).unwrap().unwrap();
        assert_eq!(remaining.permission, SharePermission::View);
    }
}
