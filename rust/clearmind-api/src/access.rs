//! Authorization checks.
//!
//! The workspace owner can do anything inside the workspace. Pages can also
//! be opened through an enabled user share of sufficient permission; every
//! other workspace object (databases and their views and items) is
//! owner-only. Timeline events, mood entries, notifications and automations
//! belong to the user who created them.
//!
//! The `check_*` functions validate writes on top of access, and are shared
//! by the REST handlers and offline sync.

use rusqlite::Connection;

use crate::domain::{
    Automation, Block, BlockUpdate, CommentParent, Database, DatabaseItem, DatabaseView, NewBlock,
    NewPage, Page, PageUpdate, SharePermission, TimelineEvent, Workspace,
};
use crate::error::{ApiError, ApiResult};
use crate::store::{automations, databases, pages, shares, timeline, users};

/// How a user reached an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Owner,
    Shared(SharePermission),
}

impl Access {
    pub fn allows(self, required: SharePermission) -> bool {
        match self {
            Self::Owner => true,
            Self::Shared(permission) => permission.allows(required),
        }
    }
}

fn denied(what: &str) -> ApiError {
    ApiError::forbidden(format!("You do not have access to this {what}"))
}

/// Workspace the user owns.
pub fn owned_workspace(conn: &Connection, user_id: i64, workspace_id: i64) -> ApiResult<Workspace> {
    let workspace = users::get_workspace(conn, workspace_id)?
        .ok_or_else(|| ApiError::not_found(format!("workspace {workspace_id} not found")))?;
    if workspace.owner_id != user_id {
        return Err(denied("workspace"));
    }
    Ok(workspace)
}

/// Resolves the user's access to a page without enforcing a level.
pub fn page_access(conn: &Connection, user_id: i64, page: &Page) -> ApiResult<Option<Access>> {
    let owner = users::get_workspace(conn, page.workspace_id)?.map(|ws| ws.owner_id);
    if owner == Some(user_id) {
        return Ok(Some(Access::Owner));
    }
    Ok(shares::find_user_share(conn, page.id, user_id)?.map(|share| Access::Shared(share.permission)))
}

/// Visible page the user may use at `required` level.
pub fn require_page(
    conn: &Connection,
    user_id: i64,
    page_id: i64,
    required: SharePermission,
) -> ApiResult<Page> {
    let page = pages::get_page(conn, page_id)?
        .ok_or_else(|| ApiError::not_found(format!("page {page_id} not found")))?;
    check_page(conn, user_id, &page, required)?;
    Ok(page)
}

/// Like [`require_page`] but also finds archived pages.
pub fn require_page_any(
    conn: &Connection,
    user_id: i64,
    page_id: i64,
    required: SharePermission,
) -> ApiResult<Page> {
    let page = pages::get_page_any(conn, page_id)?
        .ok_or_else(|| ApiError::not_found(format!("page {page_id} not found")))?;
    check_page(conn, user_id, &page, required)?;
    Ok(page)
}

fn check_page(conn: &Connection, user_id: i64, page: &Page, required: SharePermission) -> ApiResult<()> {
    match page_access(conn, user_id, page)? {
        Some(access) if access.allows(required) => Ok(()),
        _ => Err(denied("page")),
    }
}

pub fn require_block(
    conn: &Connection,
    user_id: i64,
    block_id: i64,
    required: SharePermission,
) -> ApiResult<(Block, Page)> {
    let block = pages::get_block(conn, block_id)?
        .ok_or_else(|| ApiError::not_found(format!("block {block_id} not found")))?;
    let page = require_page(conn, user_id, block.page_id, required)?;
    Ok((block, page))
}

/// Rejects blank names and titles.
pub fn require_text(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{field} must not be empty")));
    }
    Ok(())
}

/// A new page needs a title and either an editable parent in the same
/// workspace or a workspace the user owns.
pub fn check_new_page(conn: &Connection, user_id: i64, input: &NewPage) -> ApiResult<()> {
    require_text("title", &input.title)?;
    match input.parent_id {
        Some(parent_id) => {
            let parent = require_page(conn, user_id, parent_id, SharePermission::Edit)?;
            if parent.workspace_id != input.workspace_id {
                return Err(ApiError::bad_request("parent page belongs to another workspace"));
            }
        }
        None => {
            owned_workspace(conn, user_id, input.workspace_id)?;
        }
    }
    Ok(())
}

/// Editable page whose new title and parent are acceptable.
pub fn check_page_update(
    conn: &Connection,
    user_id: i64,
    page_id: i64,
    update: &PageUpdate,
) -> ApiResult<Page> {
    if let Some(title) = &update.title {
        require_text("title", title)?;
    }
    let page = require_page(conn, user_id, page_id, SharePermission::Edit)?;
    if let Some(Some(parent_id)) = update.parent_id {
        let parent = pages::get_page(conn, parent_id)?
            .ok_or_else(|| ApiError::not_found(format!("page {parent_id} not found")))?;
        if parent.workspace_id != page.workspace_id {
            return Err(ApiError::bad_request("parent page belongs to another workspace"));
        }
    }
    Ok(page)
}

/// Editable page a new block lands on. A parent block must live on the
/// same page.
pub fn check_new_block(conn: &Connection, user_id: i64, input: &NewBlock) -> ApiResult<Page> {
    require_text("type", &input.block_type)?;
    let page = require_page(conn, user_id, input.page_id, SharePermission::Edit)?;
    if let Some(parent_id) = input.parent_block_id {
        let parent = pages::get_block(conn, parent_id)?
            .ok_or_else(|| ApiError::not_found(format!("block {parent_id} not found")))?;
        if parent.page_id != input.page_id {
            return Err(ApiError::bad_request("parent block belongs to another page"));
        }
    }
    Ok(page)
}

/// Editable block whose new type and parent are acceptable.
pub fn check_block_update(
    conn: &Connection,
    user_id: i64,
    block_id: i64,
    update: &BlockUpdate,
) -> ApiResult<Block> {
    if let Some(block_type) = &update.block_type {
        require_text("type", block_type)?;
    }
    let (block, _) = require_block(conn, user_id, block_id, SharePermission::Edit)?;
    if let Some(Some(parent_id)) = update.parent_block_id {
        if parent_id == block_id {
            return Err(ApiError::bad_request("a block cannot be its own parent"));
        }
        let parent = pages::get_block(conn, parent_id)?
            .ok_or_else(|| ApiError::not_found(format!("block {parent_id} not found")))?;
        if parent.page_id != block.page_id {
            return Err(ApiError::bad_request("parent block belongs to another page"));
        }
    }
    Ok(block)
}

pub fn require_database(conn: &Connection, user_id: i64, database_id: i64) -> ApiResult<Database> {
    let database = databases::get_database(conn, database_id)?
        .ok_or_else(|| ApiError::not_found(format!("database {database_id} not found")))?;
    owned_workspace(conn, user_id, database.workspace_id)?;
    Ok(database)
}

pub fn require_view(conn: &Connection, user_id: i64, view_id: i64) -> ApiResult<DatabaseView> {
    let view = databases::get_view(conn, view_id)?
        .ok_or_else(|| ApiError::not_found(format!("view {view_id} not found")))?;
    require_database(conn, user_id, view.database_id)?;
    Ok(view)
}

pub fn require_item(
    conn: &Connection,
    user_id: i64,
    item_id: i64,
) -> ApiResult<(DatabaseItem, Database)> {
    let item = databases::get_item(conn, item_id)?
        .ok_or_else(|| ApiError::not_found(format!("item {item_id} not found")))?;
    let database = require_database(conn, user_id, item.database_id)?;
    Ok((item, database))
}

/// Checks access to whatever a comment hangs off. Returns the page the
/// comment thread belongs to, when there is one.
pub fn require_comment_parent(
    conn: &Connection,
    user_id: i64,
    parent_type: CommentParent,
    parent_id: i64,
) -> ApiResult<Option<Page>> {
    match parent_type {
        CommentParent::Page => {
            require_page(conn, user_id, parent_id, SharePermission::View).map(Some)
        }
        CommentParent::Block => {
            require_block(conn, user_id, parent_id, SharePermission::View).map(|(_, page)| Some(page))
        }
        CommentParent::DatabaseItem => require_item(conn, user_id, parent_id).map(|_| None),
    }
}

/// Workspace the comment thread lives in.
pub fn comment_workspace(
    conn: &Connection,
    parent_type: CommentParent,
    parent_id: i64,
) -> ApiResult<Option<i64>> {
    Ok(match parent_type {
        CommentParent::Page => pages::get_page_any(conn, parent_id)?.map(|p| p.workspace_id),
        CommentParent::Block => match pages::get_block(conn, parent_id)? {
            Some(block) => pages::get_page_any(conn, block.page_id)?.map(|p| p.workspace_id),
            None => None,
        },
        CommentParent::DatabaseItem => match databases::get_item(conn, parent_id)? {
            Some(item) => databases::get_database(conn, item.database_id)?.map(|d| d.workspace_id),
            None => None,
        },
    })
}

pub fn require_event(conn: &Connection, user_id: i64, event_id: i64) -> ApiResult<TimelineEvent> {
    let event = timeline::get_event(conn, event_id)?
        .ok_or_else(|| ApiError::not_found(format!("event {event_id} not found")))?;
    if event.user_id != user_id {
        return Err(denied("event"));
    }
    Ok(event)
}

pub fn require_automation(
    conn: &Connection,
    user_id: i64,
    automation_id: i64,
) -> ApiResult<Automation> {
    let automation = automations::get_automation(conn, automation_id)?
        .ok_or_else(|| ApiError::not_found(format!("automation {automation_id} not found")))?;
    if automation.created_by != user_id {
        return Err(denied("automation"));
    }
    Ok(automation)
}
