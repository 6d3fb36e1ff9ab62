//! Page sharing endpoints.
//!
//! Managing shares needs admin access to the page. `POST /shared/{token}`
//! is public and serves the page behind an enabled link share.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};

use super::Success;
use crate::AppState;
use crate::access;
use crate::domain::{
    Block, NewNotification, NewShare, NotificationType, Page, PageShare, SharePermission,
    ShareUpdate,
};
use crate::error::{ApiError, ApiResult};
use crate::gateway::AuthenticatedUser;
use crate::store::{notifications, pages, shares, users};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/pages/{id}/shares", get(list_shares).post(create_share))
        .route("/api/v1/shares/{id}", patch(update_share).delete(delete_share))
        .route("/api/v1/shared/{token}", post(open_shared))
}

async fn list_shares(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(page_id): Path<i64>,
) -> ApiResult<Json<Vec<PageShare>>> {
    let list = state
        .store
        .call(move |conn| {
            access::require_page(conn, user.id, page_id, SharePermission::Admin)?;
            Ok::<_, ApiError>(shares::list_shares_for_page(conn, page_id)?)
        })
        .await?;
    Ok(Json(list))
}

async fn create_share(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(page_id): Path<i64>,
    Json(input): Json<NewShare>,
) -> ApiResult<Json<PageShare>> {
    let sharer = user.display_name();
    let share = state
        .store
        .call(move |conn| -> ApiResult<PageShare> {
            let page = access::require_page(conn, user.id, page_id, SharePermission::Admin)?;
            if let Some(grantee) = input.user_id {
                if grantee == user.id {
                    return Err(ApiError::bad_request("cannot share a page with yourself"));
                }
                users::get_user(conn, grantee)?
                    .ok_or_else(|| ApiError::not_found(format!("user {grantee} not found")))?;
            }
            let share = shares::create_share(conn, page_id, user.id, &input)?;
            if let Some(grantee) = share.user_id {
                let notice = NewNotification::in_app(
                    grantee,
                    NotificationType::Collaboration,
                    format!("{sharer} shared \"{}\" with you", page.title),
                )
                .with_link("page", page.id);
                notifications::create_notification(conn, &notice)?;
            }
            Ok(share)
        })
        .await?;
    tracing::info!(
        share_id = share.id,
        page_id,
        public = share.share_token.is_some(),
        "Page shared"
    );
    Ok(Json(share))
}

/// Share plus admin access to its page.
fn managed_share(conn: &rusqlite::Connection, user_id: i64, id: i64) -> ApiResult<PageShare> {
    let share = shares::get_share(conn, id)?
        .ok_or_else(|| ApiError::not_found(format!("share {id} not found")))?;
    access::require_page_any(conn, user_id, share.page_id, SharePermission::Admin)?;
    Ok(share)
}

async fn update_share(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Json(update): Json<ShareUpdate>,
) -> ApiResult<Json<PageShare>> {
    let share = state
        .store
        .call(move |conn| {
            managed_share(conn, user.id, id)?;
            Ok::<_, ApiError>(shares::update_share(conn, id, &update)?)
        })
        .await?;
    Ok(Json(share))
}

async fn delete_share(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Success>> {
    state
        .store
        .call(move |conn| {
            managed_share(conn, user.id, id)?;
            Ok::<_, ApiError>(shares::delete_share(conn, id)?)
        })
        .await?;
    Ok(Json(Success::ok()))
}

#[derive(Debug, Default, Deserialize)]
struct OpenSharedRequest {
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SharedPage {
    page: Page,
    blocks: Vec<Block>,
    permission: SharePermission,
}

async fn open_shared(
    State(state): State<AppState>,
    Path(token): Path<String>,
    body: Option<Json<OpenSharedRequest>>,
) -> ApiResult<Json<SharedPage>> {
    let Json(request) = body.unwrap_or_default();
    let shared = state
        .store
        .call(move |conn| -> ApiResult<SharedPage> {
            let share = shares::get_share_by_token(conn, &token)?
                .ok_or_else(|| ApiError::not_found("Share link not found"))?;
            if !shares::verify_share_password(&share, request.password.as_deref()) {
                return Err(ApiError::Unauthorized("Invalid share password".to_string()));
            }
            let page = pages::get_page(conn, share.page_id)?
                .ok_or_else(|| ApiError::not_found("Shared page is no longer available"))?;
            let blocks = pages::list_blocks_by_page(conn, page.id)?;
            Ok(SharedPage {
                page,
                blocks,
                permission: share.permission,
            })
        })
        .await?;
    Ok(Json(shared))
}
