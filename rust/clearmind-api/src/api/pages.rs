//! Page and block endpoints.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use serde::Deserialize;

use super::{LimitQuery, Success};
use crate::AppState;
use crate::access;
use crate::automation::AutomationEvent;
use crate::domain::{
    Block, BlockUpdate, NewBlock, NewPage, Page, PageNode, PageUpdate, SharePermission, TriggerKind,
};
use crate::error::{ApiError, ApiResult};
use crate::gateway::AuthenticatedUser;
use crate::store::pages;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/pages", post(create_page))
        .route("/api/v1/pages/{id}", get(get_page).patch(update_page))
        .route("/api/v1/pages/{id}/archive", post(archive_page))
        .route("/api/v1/pages/{id}/unarchive", post(unarchive_page))
        .route("/api/v1/pages/{id}/children", get(list_children))
        .route("/api/v1/workspaces/{id}/pages/hierarchy", get(hierarchy))
        .route("/api/v1/workspaces/{id}/pages/root", get(list_root))
        .route("/api/v1/workspaces/{id}/pages/recent", get(list_recent))
        .route("/api/v1/workspaces/{id}/pages/archived", get(list_archived))
        .route("/api/v1/pages/{id}/blocks", get(list_blocks))
        .route("/api/v1/pages/{id}/blocks/reorder", post(reorder_blocks))
        .route("/api/v1/blocks", post(create_block))
        .route("/api/v1/blocks/{id}", patch(update_block).delete(delete_block))
}

async fn get_page(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Page>> {
    let page = state
        .store
        .call(move |conn| access::require_page(conn, user.id, id, SharePermission::View))
        .await?;
    Ok(Json(page))
}

async fn create_page(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(input): Json<NewPage>,
) -> ApiResult<Json<Page>> {
    let page = state
        .store
        .call(move |conn| {
            access::check_new_page(conn, user.id, &input)?;
            Ok::<_, ApiError>(pages::create_page(conn, user.id, &input)?)
        })
        .await?;

    tracing::debug!(page_id = page.id, workspace_id = page.workspace_id, "Page created");
    state
        .automations
        .notify(AutomationEvent::new(
            TriggerKind::PageCreated,
            page.workspace_id,
            user.id,
            "page",
            &page,
        ))
        .await;
    Ok(Json(page))
}

async fn update_page(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Json(update): Json<PageUpdate>,
) -> ApiResult<Json<Page>> {
    let page = state
        .store
        .call(move |conn| {
            access::check_page_update(conn, user.id, id, &update)?;
            Ok::<_, ApiError>(pages::update_page(conn, id, &update)?)
        })
        .await?;

    state
        .automations
        .notify(AutomationEvent::new(
            TriggerKind::PageUpdated,
            page.workspace_id,
            user.id,
            "page",
            &page,
        ))
        .await;
    Ok(Json(page))
}

async fn archive_page(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Page>> {
    let page = state
        .store
        .call(move |conn| {
            access::require_page_any(conn, user.id, id, SharePermission::Admin)?;
            Ok::<_, ApiError>(pages::archive_page(conn, id)?)
        })
        .await?;
    Ok(Json(page))
}

async fn unarchive_page(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Page>> {
    let page = state
        .store
        .call(move |conn| {
            access::require_page_any(conn, user.id, id, SharePermission::Admin)?;
            Ok::<_, ApiError>(pages::unarchive_page(conn, id)?)
        })
        .await?;
    Ok(Json(page))
}

async fn list_children(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Page>>> {
    let children = state
        .store
        .call(move |conn| {
            access::require_page(conn, user.id, id, SharePermission::View)?;
            Ok::<_, ApiError>(pages::list_child_pages(conn, id)?)
        })
        .await?;
    Ok(Json(children))
}

async fn hierarchy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
) -> ApiResult<Json<Vec<PageNode>>> {
    let tree = state
        .store
        .call(move |conn| {
            access::owned_workspace(conn, user.id, workspace_id)?;
            Ok::<_, ApiError>(pages::page_hierarchy(conn, workspace_id)?)
        })
        .await?;
    Ok(Json(tree))
}

async fn list_root(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
) -> ApiResult<Json<Vec<Page>>> {
    let roots = state
        .store
        .call(move |conn| {
            access::owned_workspace(conn, user.id, workspace_id)?;
            Ok::<_, ApiError>(pages::list_root_pages(conn, workspace_id)?)
        })
        .await?;
    Ok(Json(roots))
}

async fn list_recent(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<Page>>> {
    let limit = query.limit.unwrap_or(pages::DEFAULT_RECENT_LIMIT).clamp(1, 100);
    let recent = state
        .store
        .call(move |conn| {
            access::owned_workspace(conn, user.id, workspace_id)?;
            Ok::<_, ApiError>(pages::list_recent_pages(conn, workspace_id, limit)?)
        })
        .await?;
    Ok(Json(recent))
}

async fn list_archived(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
) -> ApiResult<Json<Vec<Page>>> {
    let archived = state
        .store
        .call(move |conn| {
            access::owned_workspace(conn, user.id, workspace_id)?;
            Ok::<_, ApiError>(pages::list_archived_pages(conn, workspace_id)?)
        })
        .await?;
    Ok(Json(archived))
}

async fn list_blocks(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(page_id): Path<i64>,
) -> ApiResult<Json<Vec<Block>>> {
    let blocks = state
        .store
        .call(move |conn| {
            access::require_page(conn, user.id, page_id, SharePermission::View)?;
            Ok::<_, ApiError>(pages::list_blocks_by_page(conn, page_id)?)
        })
        .await?;
    Ok(Json(blocks))
}

async fn create_block(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(input): Json<NewBlock>,
) -> ApiResult<Json<Block>> {
    let block = state
        .store
        .call(move |conn| {
            access::check_new_block(conn, user.id, &input)?;
            let block = pages::create_block(conn, user.id, &input)?;
            pages::touch_page(conn, block.page_id)?;
            Ok::<_, ApiError>(block)
        })
        .await?;
    Ok(Json(block))
}

async fn update_block(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Json(update): Json<BlockUpdate>,
) -> ApiResult<Json<Block>> {
    let block = state
        .store
        .call(move |conn| {
            access::check_block_update(conn, user.id, id, &update)?;
            let block = pages::update_block(conn, id, &update)?;
            pages::touch_page(conn, block.page_id)?;
            Ok::<_, ApiError>(block)
        })
        .await?;
    Ok(Json(block))
}

async fn delete_block(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Success>> {
    state
        .store
        .call(move |conn| {
            access::require_block(conn, user.id, id, SharePermission::Edit)?;
            let block = pages::delete_block(conn, id)?;
            pages::touch_page(conn, block.page_id)?;
            Ok::<_, ApiError>(())
        })
        .await?;
    Ok(Json(Success::ok()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReorderRequest {
    block_ids: Vec<i64>,
}

async fn reorder_blocks(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(page_id): Path<i64>,
    Json(body): Json<ReorderRequest>,
) -> ApiResult<Json<Vec<Block>>> {
    let blocks = state
        .store
        .call(move |conn| {
            access::require_page(conn, user.id, page_id, SharePermission::Edit)?;
            let blocks = pages::reorder_blocks(conn, page_id, &body.block_ids)?;
            pages::touch_page(conn, page_id)?;
            Ok::<_, ApiError>(blocks)
        })
        .await?;
    Ok(Json(blocks))
}
