//! Comments on pages, blocks and database items.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{StoreError, StoreResult, json_column, to_json_text};
use crate::domain::{Comment, CommentParent, CommentUpdate, NewComment};

const COMMENT_COLUMNS: &str =
    "id, parent_type, parent_id, content, mentions, created_by, created_at, updated_at, archived";

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        parent_type: row.get(1)?,
        parent_id: row.get(2)?,
        content: row.get(3)?,
        mentions: json_column(row, 4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        archived: row.get(8)?,
    })
}

pub fn create_comment(conn: &Connection, user_id: i64, input: &NewComment) -> StoreResult<Comment> {
    if input.content.trim().is_empty() {
        return Err(StoreError::invalid("content", "must not be empty"));
    }
    let now = Utc::now();
    conn.execute(
        "INSERT INTO comments (parent_type, parent_id, content, mentions, created_by,
                               created_at, updated_at, archived)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, 0)",
        params![
            input.parent_type,
            input.parent_id,
            input.content,
            to_json_text(&input.mentions)?,
            user_id,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_comment(conn, id)?.ok_or(StoreError::not_found("comment", id))
}

/// Comment by id; archived comments are hidden.
pub fn get_comment(conn: &Connection, id: i64) -> StoreResult<Option<Comment>> {
    let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1 AND archived = 0");
    Ok(conn.query_row(&sql, [id], comment_from_row).optional()?)
}

/// Live comments on a parent, oldest first.
pub fn list_comments(
    conn: &Connection,
    parent_type: CommentParent,
    parent_id: i64,
) -> StoreResult<Vec<Comment>> {
    let sql = format!(
        "SELECT {COMMENT_COLUMNS} FROM comments
         WHERE parent_type = ?1 AND parent_id = ?2 AND archived = 0
         ORDER BY created_at ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![parent_type, parent_id], comment_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn update_comment(conn: &Connection, id: i64, update: &CommentUpdate) -> StoreResult<Comment> {
    if update.content.trim().is_empty() {
        return Err(StoreError::invalid("content", "must not be empty"));
    }
    let mut comment = get_comment(conn, id)?.ok_or(StoreError::not_found("comment", id))?;
    comment.content.clone_from(&update.content);
    if let Some(mentions) = &update.mentions {
        comment.mentions.clone_from(mentions);
    }
    comment.updated_at = Utc::now();

    conn.execute(
        "UPDATE comments SET content = ?1, mentions = ?2, updated_at = ?3 WHERE id = ?4",
        params![
            comment.content,
            to_json_text(&comment.mentions)?,
            comment.updated_at,
            id,
        ],
    )?;
    Ok(comment)
}

/// Soft-deletes a comment.
pub fn archive_comment(conn: &Connection, id: i64) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE comments SET archived = 1, updated_at = ?1 WHERE id = ?2 AND archived = 0",
        params![Utc::now(), id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("comment", id));
    }
    Ok(())
}
