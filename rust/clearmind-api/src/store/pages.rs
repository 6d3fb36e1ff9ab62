//! Pages and blocks.

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{StoreError, StoreResult, json_column, next_position, to_json_text};
use crate::domain::{Block, BlockUpdate, NewBlock, NewPage, Page, PageNode, PageUpdate};

const PAGE_COLUMNS: &str = "id, workspace_id, parent_id, title, icon, cover_image, position, \
     archived, archived_at, created_by, created_at, updated_at";

const BLOCK_COLUMNS: &str =
    "id, page_id, parent_block_id, type, content, position, created_by, created_at, updated_at";

/// Default page count for the "recent" list.
pub const DEFAULT_RECENT_LIMIT: usize = 10;

pub(crate) fn page_from_row(row: &Row<'_>) -> rusqlite::Result<Page> {
    Ok(Page {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        parent_id: row.get(2)?,
        title: row.get(3)?,
        icon: row.get(4)?,
        cover_image: row.get(5)?,
        position: row.get(6)?,
        archived: row.get(7)?,
        archived_at: row.get(8)?,
        created_by: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn block_from_row(row: &Row<'_>) -> rusqlite::Result<Block> {
    Ok(Block {
        id: row.get(0)?,
        page_id: row.get(1)?,
        parent_block_id: row.get(2)?,
        block_type: row.get(3)?,
        content: json_column(row, 4)?,
        position: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn query_pages(
    conn: &Connection,
    filter: &str,
    params: impl rusqlite::Params,
) -> StoreResult<Vec<Page>> {
    let sql = format!("SELECT {PAGE_COLUMNS} FROM pages WHERE {filter}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params, page_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn create_page(conn: &Connection, user_id: i64, input: &NewPage) -> StoreResult<Page> {
    let now = Utc::now();
    let position = match input.position {
        Some(position) => position,
        None => match input.parent_id {
            Some(parent) => next_position(conn, "pages", "parent_id = ?1", &parent)?,
            None => next_position(
                conn,
                "pages",
                "parent_id IS NULL AND workspace_id = ?1",
                &input.workspace_id,
            )?,
        },
    };

    conn.execute(
        "INSERT INTO pages (workspace_id, parent_id, title, icon, cover_image, position,
                            archived, created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?8)",
        params![
            input.workspace_id,
            input.parent_id,
            input.title,
            input.icon,
            input.cover_image,
            position,
            user_id,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_page_any(conn, id)?.ok_or(StoreError::not_found("page", id))
}

/// Page by id, archived or not.
pub fn get_page_any(conn: &Connection, id: i64) -> StoreResult<Option<Page>> {
    let sql = format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], page_from_row).optional()?)
}

/// Page by id, hidden once archived.
pub fn get_page(conn: &Connection, id: i64) -> StoreResult<Option<Page>> {
    Ok(get_page_any(conn, id)?.filter(|page| !page.archived))
}

pub fn list_root_pages(conn: &Connection, workspace_id: i64) -> StoreResult<Vec<Page>> {
    query_pages(
        conn,
        "workspace_id = ?1 AND parent_id IS NULL AND archived = 0 ORDER BY position ASC, id ASC",
        [workspace_id],
    )
}

pub fn list_child_pages(conn: &Connection, parent_id: i64) -> StoreResult<Vec<Page>> {
    query_pages(
        conn,
        "parent_id = ?1 AND archived = 0 ORDER BY position ASC, id ASC",
        [parent_id],
    )
}

pub fn list_recent_pages(
    conn: &Connection,
    workspace_id: i64,
    limit: usize,
) -> StoreResult<Vec<Page>> {
    query_pages(
        conn,
        "workspace_id = ?1 AND archived = 0 ORDER BY updated_at DESC, id DESC LIMIT ?2",
        params![workspace_id, i64::try_from(limit).unwrap_or(i64::MAX)],
    )
}

pub fn list_archived_pages(conn: &Connection, workspace_id: i64) -> StoreResult<Vec<Page>> {
    query_pages(
        conn,
        "workspace_id = ?1 AND archived = 1 ORDER BY archived_at DESC, id DESC",
        [workspace_id],
    )
}

/// Nested tree of the workspace's visible pages, ordered by position.
///
/// Pages whose parent is archived or missing are left out along with their
/// whole subtree.
pub fn page_hierarchy(conn: &Connection, workspace_id: i64) -> StoreResult<Vec<PageNode>> {
    let pages = query_pages(
        conn,
        "workspace_id = ?1 AND archived = 0 ORDER BY position ASC, id ASC",
        [workspace_id],
    )?;
    Ok(build_tree(pages))
}

pub(crate) fn build_tree(pages: Vec<Page>) -> Vec<PageNode> {
    let mut children: HashMap<Option<i64>, Vec<Page>> = HashMap::new();
    for page in pages {
        children.entry(page.parent_id).or_default().push(page);
    }

    fn attach(page: Page, children: &mut HashMap<Option<i64>, Vec<Page>>) -> PageNode {
        let kids = children.remove(&Some(page.id)).unwrap_or_default();
        PageNode {
            page,
            children: kids.into_iter().map(|kid| attach(kid, children)).collect(),
        }
    }

    let roots = children.remove(&None).unwrap_or_default();
    roots.into_iter().map(|root| attach(root, &mut children)).collect()
}

pub fn update_page(conn: &Connection, id: i64, update: &PageUpdate) -> StoreResult<Page> {
    let mut page = get_page(conn, id)?.ok_or(StoreError::not_found("page", id))?;

    if let Some(title) = &update.title {
        page.title.clone_from(title);
    }
    if let Some(icon) = &update.icon {
        page.icon.clone_from(icon);
    }
    if let Some(cover) = &update.cover_image {
        page.cover_image.clone_from(cover);
    }
    if let Some(parent) = update.parent_id {
        if let Some(parent_id) = parent
            && is_ancestor_or_self(conn, id, parent_id)?
        {
            return Err(StoreError::invalid(
                "parentId",
                "a page cannot be moved under itself or one of its sub-pages",
            ));
        }
        page.parent_id = parent;
    }
    if let Some(position) = update.position {
        page.position = position;
    }
    page.updated_at = Utc::now();

    conn.execute(
        "UPDATE pages SET title = ?1, icon = ?2, cover_image = ?3, parent_id = ?4,
                          position = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            page.title,
            page.icon,
            page.cover_image,
            page.parent_id,
            page.position,
            page.updated_at,
            id,
        ],
    )?;
    Ok(page)
}

/// True when `ancestor` is `page_id` or sits above it in the tree.
fn is_ancestor_or_self(conn: &Connection, ancestor: i64, page_id: i64) -> StoreResult<bool> {
    let mut current = Some(page_id);
    let mut hops = 0;
    while let Some(id) = current {
        if id == ancestor {
            return Ok(true);
        }
        // An existing cycle must not hang the walk.
        hops += 1;
        if hops > 10_000 {
            return Ok(true);
        }
        current = conn
            .query_row("SELECT parent_id FROM pages WHERE id = ?1", [id], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .optional()?
            .flatten();
    }
    Ok(false)
}

/// Soft-deletes a page. Children stay in place but drop out of the tree.
pub fn archive_page(conn: &Connection, id: i64) -> StoreResult<Page> {
    let now = Utc::now();
    let changed = conn.execute(
        "UPDATE pages SET archived = 1, archived_at = ?1, updated_at = ?1
         WHERE id = ?2 AND archived = 0",
        params![now, id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("page", id));
    }
    get_page_any(conn, id)?.ok_or(StoreError::not_found("page", id))
}

pub fn unarchive_page(conn: &Connection, id: i64) -> StoreResult<Page> {
    let changed = conn.execute(
        "UPDATE pages SET archived = 0, archived_at = NULL, updated_at = ?1
         WHERE id = ?2 AND archived = 1",
        params![Utc::now(), id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("archived page", id));
    }
    get_page_any(conn, id)?.ok_or(StoreError::not_found("page", id))
}

/// Bumps `updated_at` so edits to blocks surface the page as recent.
pub fn touch_page(conn: &Connection, id: i64) -> StoreResult<()> {
    conn.execute(
        "UPDATE pages SET updated_at = ?1 WHERE id = ?2",
        params![Utc::now(), id],
    )?;
    Ok(())
}

pub fn create_block(conn: &Connection, user_id: i64, input: &NewBlock) -> StoreResult<Block> {
    let now = Utc::now();
    let position = match input.position {
        Some(position) => position,
        None => next_position(conn, "blocks", "page_id = ?1", &input.page_id)?,
    };
    conn.execute(
        "INSERT INTO blocks (page_id, parent_block_id, type, content, position,
                             created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            input.page_id,
            input.parent_block_id,
            input.block_type,
            to_json_text(&input.content)?,
            position,
            user_id,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    touch_page(conn, input.page_id)?;
    get_block(conn, id)?.ok_or(StoreError::not_found("block", id))
}

pub fn get_block(conn: &Connection, id: i64) -> StoreResult<Option<Block>> {
    let sql = format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], block_from_row).optional()?)
}

pub fn list_blocks_by_page(conn: &Connection, page_id: i64) -> StoreResult<Vec<Block>> {
    let sql = format!(
        "SELECT {BLOCK_COLUMNS} FROM blocks WHERE page_id = ?1 ORDER BY position ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([page_id], block_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn update_block(conn: &Connection, id: i64, update: &BlockUpdate) -> StoreResult<Block> {
    let mut block = get_block(conn, id)?.ok_or(StoreError::not_found("block", id))?;

    if let Some(block_type) = &update.block_type {
        block.block_type.clone_from(block_type);
    }
    if let Some(content) = &update.content {
        block.content = content.clone();
    }
    if let Some(position) = update.position {
        block.position = position;
    }
    if let Some(parent) = update.parent_block_id {
        block.parent_block_id = parent;
    }
    block.updated_at = Utc::now();

    conn.execute(
        "UPDATE blocks SET type = ?1, content = ?2, position = ?3, parent_block_id = ?4,
                           updated_at = ?5
         WHERE id = ?6",
        params![
            block.block_type,
            to_json_text(&block.content)?,
            block.position,
            block.parent_block_id,
            block.updated_at,
            id,
        ],
    )?;
    touch_page(conn, block.page_id)?;
    Ok(block)
}

/// Hard-deletes a block.
pub fn delete_block(conn: &Connection, id: i64) -> StoreResult<Block> {
    let block = get_block(conn, id)?.ok_or(StoreError::not_found("block", id))?;
    conn.execute("DELETE FROM blocks WHERE id = ?1", [id])?;
    touch_page(conn, block.page_id)?;
    Ok(block)
}

/// Rewrites block positions to follow `ordered_ids`. Ids not on the page
/// are rejected; blocks not listed keep their relative order after them.
pub fn reorder_blocks(
    conn: &mut Connection,
    page_id: i64,
    ordered_ids: &[i64],
) -> StoreResult<Vec<Block>> {
    let tx = conn.transaction()?;
    let existing = list_blocks_by_page(&tx, page_id)?;
    for id in ordered_ids {
        if !existing.iter().any(|block| block.id == *id) {
            return Err(StoreError::invalid(
                "blockIds",
                format!("block {id} does not belong to page {page_id}"),
            ));
        }
    }

    let rest = existing
        .iter()
        .map(|block| block.id)
        .filter(|id| !ordered_ids.contains(id));
    let now = Utc::now();
    for (position, id) in ordered_ids.iter().copied().chain(rest).enumerate() {
        tx.execute(
            "UPDATE blocks SET position = ?1, updated_at = ?2 WHERE id = ?3",
            params![i64::try_from(position).unwrap_or(i64::MAX), now, id],
        )?;
    }
    touch_page(&tx, page_id)?;
    let blocks = list_blocks_by_page(&tx, page_id)?;
    tx.commit()?;
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support;
    use serde_json::json;

    #[test]
    fn pages_append_after_their_siblings() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u");
        let ws = test_support::workspace(&conn, &user);
        let a = test_support::page(&conn, &ws, None, "A");
        let b = test_support::page(&conn, &ws, None, "B");
        let child = test_support::page(&conn, &ws, Some(a.id), "A.1");
        assert_eq!(a.position, 0);
        assert_eq!(b.position, 1);
        assert_eq!(child.position, 0);

        let roots = list_root_pages(&conn, ws.id).unwrap();
        assert_eq!(roots.iter().map(|p| p.title.as_str()).collect::<Vec<_>>(), ["A", "B"]);
        assert_eq!(list_child_pages(&conn, a.id).unwrap().len(), 1);
    }

    #[test]
    fn hierarchy_drops_archived_subtrees() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u");
        let ws = test_support::workspace(&conn, &user);
        let a = test_support::page(&conn, &ws, None, "A");
        let b = test_support::page(&conn, &ws, None, "B");
        let a1 = test_support::page(&conn, &ws, Some(a.id), "A.1");
        test_support::page(&conn, &ws, Some(a1.id), "A.1.a");
        test_support::page(&conn, &ws, Some(b.id), "B.1");

        archive_page(&conn, b.id).unwrap();

        let tree = page_hierarchy(&conn, ws.id).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].page.title, "A");
        assert_eq!(tree[0].children[0].page.title, "A.1");
        assert_eq!(tree[0].children[0].children[0].page.title, "A.1.a");
    }

    #[test]
    fn archive_and_restore_round_trip() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u");
        let ws = test_support::workspace(&conn, &user);
        let page = test_support::page(&conn, &ws, None, "Draft");

        let archived = archive_page(&conn, page.id).unwrap();
        assert!(archived.archived);
        assert!(archived.archived_at.is_some());
        assert!(get_page(&conn, page.id).unwrap().is_none());
        assert_eq!(list_archived_pages(&conn, ws.id).unwrap().len(), 1);
        assert!(matches!(archive_page(&conn, page.id), Err(StoreError::NotFound { .. })));

        let restored = unarchive_page(&conn, page.id).unwrap();
        assert!(!restored.archived);
        assert!(restored.archived_at.is_none());
        assert!(list_archived_pages(&conn, ws.id).unwrap().is_empty());
    }

    #[test]
    fn recent_pages_follow_last_edit() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u");
        let ws = test_support::workspace(&conn, &user);
        let first = test_support::page(&conn, &ws, None, "First");
        test_support::page(&conn, &ws, None, "Second");
        std::thread::sleep(std::time::Duration::from_millis(5));
        update_page(
            &conn,
            first.id,
            &PageUpdate {
                title: Some("First, edited".to_string()),
                ..PageUpdate::default()
            },
        )
        .unwrap();

        let recent = list_recent_pages(&conn, ws.id, 1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].title, "First, edited");
    }

    #[test]
    fn page_cannot_parent_itself() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u");
        let ws = test_support::workspace(&conn, &user);
        let page = test_support::page(&conn, &ws, None, "Loop");
        let update = PageUpdate {
            parent_id: Some(Some(page.id)),
            ..PageUpdate::default()
        };
        assert!(matches!(
            update_page(&conn, page.id, &update),
            Err(StoreError::Invalid { .. })
        ));
    }

    #[test]
    fn page_cannot_move_under_its_descendant() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u");
        let ws = test_support::workspace(&conn, &user);
        let top = test_support::page(&conn, &ws, None, "Projects");
        let mid = test_support::page(&conn, &ws, Some(top.id), "Launch");
        let leaf = test_support::page(&conn, &ws, Some(mid.id), "Checklist");

        for target in [mid.id, leaf.id] {
            let update = PageUpdate {
                parent_id: Some(Some(target)),
                ..PageUpdate::default()
            };
            assert!(matches!(
                update_page(&conn, top.id, &update),
                Err(StoreError::Invalid { field: "parentId", .. })
            ));
        }

        let detach = PageUpdate {
            parent_id: Some(Some(top.id)),
            ..PageUpdate::default()
        };
        assert_eq!(update_page(&conn, leaf.id, &detach).unwrap().parent_id, Some(top.id));
        let tree = page_hierarchy(&conn, ws.id).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children.len(), 2);
    }

    #[test]
    fn blocks_keep_order_and_can_be_reordered() {
        let mut conn = test_support::conn();
        let user = test_support::user(&conn, "u");
        let ws = test_support::workspace(&conn, &user);
        let page = test_support::page(&conn, &ws, None, "Notes");

        let ids: Vec<i64> = ["one", "two", "three"]
            .iter()
            .map(|text| {
                create_block(
                    &conn,
                    user.id,
                    &NewBlock {
                        page_id: page.id,
                        parent_block_id: None,
                        block_type: "paragraph".to_string(),
                        content: json!({ "text": text }),
                        position: None,
                    },
                )
                .unwrap()
                .id
            })
            .collect();

        let blocks = reorder_blocks(&mut conn, page.id, &[ids[2], ids[0]]).unwrap();
        let order: Vec<String> = blocks.iter().map(Block::text).collect();
        assert_eq!(order, ["three", "one", "two"]);

        let deleted = delete_block(&conn, ids[1]).unwrap();
        assert_eq!(deleted.text(), "two");
        assert_eq!(list_blocks_by_page(&conn, page.id).unwrap().len(), 2);

        assert!(reorder_blocks(&mut conn, page.id, &[9999]).is_err());
    }
}
