//! Notification inbox endpoints.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::Serialize;

use crate::AppState;
use crate::domain::Notification;
use crate::error::ApiResult;
use crate::gateway::AuthenticatedUser;
use crate::store::notifications;

use super::Success;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/notifications/unread", get(unread))
        .route("/api/v1/notifications/{id}/read", post(mark_read))
        .route("/api/v1/notifications/read-all", post(mark_all_read))
}

async fn unread(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Vec<Notification>>> {
    let list = state
        .store
        .call(move |conn| notifications::list_unread(conn, user.id))
        .await?;
    Ok(Json(list))
}

async fn mark_read(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Success>> {
    state
        .store
        .call(move |conn| notifications::mark_read(conn, user.id, id))
        .await?;
    Ok(Json(Success::ok()))
}

#[derive(Debug, Serialize)]
struct MarkAllResponse {
    success: bool,
    updated: usize,
}

async fn mark_all_read(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<MarkAllResponse>> {
    let updated = state
        .store
        .call(move |conn| notifications::mark_all_read(conn, user.id))
        .await?;
    Ok(Json(MarkAllResponse { success: true, updated }))
}
