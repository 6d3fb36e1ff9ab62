//! Workspace endpoints.

use axum::{Extension, Json, Router, extract::State, routing::get};

use super::require_text;
use crate::AppState;
use crate::domain::{NewWorkspace, Workspace};
use crate::error::{ApiError, ApiResult};
use crate::gateway::AuthenticatedUser;
use crate::store::users;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/workspaces", get(list_workspaces).post(create_workspace))
        .route("/api/v1/workspaces/default", get(default_workspace))
}

async fn list_workspaces(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Vec<Workspace>>> {
    let workspaces = state
        .store
        .call(move |conn| users::list_workspaces_by_owner(conn, user.id))
        .await?;
    Ok(Json(workspaces))
}

async fn create_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(input): Json<NewWorkspace>,
) -> ApiResult<Json<Workspace>> {
    require_text("name", &input.name)?;
    let workspace = state
        .store
        .call(move |conn| users::create_workspace(conn, user.id, &input))
        .await?;
    tracing::info!(workspace_id = workspace.id, user_id = user.id, "Workspace created");
    Ok(Json(workspace))
}

async fn default_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Workspace>> {
    let workspace = state
        .store
        .call(move |conn| {
            let user = users::get_user(conn, user.id)?
                .ok_or_else(|| ApiError::not_found(format!("user {} not found", user.id)))?;
            Ok::<_, ApiError>(users::get_or_create_default_workspace(conn, &user)?)
        })
        .await?;
    Ok(Json(workspace))
}
