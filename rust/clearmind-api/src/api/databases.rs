//! Database, view and item endpoints.
//!
//! Databases are owner-only: every route resolves the workspace through
//! [`access::require_database`].

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    routing::{get, patch, post},
};

use super::{Success, require_text};
use crate::AppState;
use crate::access;
use crate::automation::{self, AutomationEvent};
use crate::domain::{
    Database, DatabaseItem, DatabaseUpdate, DatabaseView, ItemUpdate, NewDatabase, NewItem,
    NewView, TriggerKind, ViewUpdate,
};
use crate::error::{ApiError, ApiResult};
use crate::gateway::AuthenticatedUser;
use crate::store::databases;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/databases", post(create_database))
        .route("/api/v1/databases/{id}", get(get_database).patch(update_database))
        .route("/api/v1/workspaces/{id}/databases", get(list_databases))
        .route("/api/v1/databases/{id}/views", get(list_views))
        .route("/api/v1/database-views", post(create_view))
        .route("/api/v1/database-views/{id}", patch(update_view).delete(delete_view))
        .route("/api/v1/databases/{id}/items", get(list_items))
        .route("/api/v1/database-items", post(create_item))
        .route("/api/v1/database-items/{id}", get(get_item).patch(update_item))
        .route("/api/v1/database-items/{id}/archive", post(archive_item))
}

async fn get_database(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Database>> {
    let database = state
        .store
        .call(move |conn| access::require_database(conn, user.id, id))
        .await?;
    Ok(Json(database))
}

async fn list_databases(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(workspace_id): Path<i64>,
) -> ApiResult<Json<Vec<Database>>> {
    let list = state
        .store
        .call(move |conn| {
            access::owned_workspace(conn, user.id, workspace_id)?;
            Ok::<_, ApiError>(databases::list_databases_by_workspace(conn, workspace_id)?)
        })
        .await?;
    Ok(Json(list))
}

async fn create_database(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(input): Json<NewDatabase>,
) -> ApiResult<Json<Database>> {
    require_text("name", &input.name)?;
    let database = state
        .store
        .call(move |conn| {
            access::owned_workspace(conn, user.id, input.workspace_id)?;
            Ok::<_, ApiError>(databases::create_database(conn, user.id, &input)?)
        })
        .await?;
    tracing::debug!(database_id = database.id, "Database created");
    Ok(Json(database))
}

async fn update_database(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Json(update): Json<DatabaseUpdate>,
) -> ApiResult<Json<Database>> {
    if let Some(name) = &update.name {
        require_text("name", name)?;
    }
    let database = state
        .store
        .call(move |conn| {
            access::require_database(conn, user.id, id)?;
            Ok::<_, ApiError>(databases::update_database(conn, id, &update)?)
        })
        .await?;
    Ok(Json(database))
}

async fn list_views(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(database_id): Path<i64>,
) -> ApiResult<Json<Vec<DatabaseView>>> {
    let views = state
        .store
        .call(move |conn| {
            access::require_database(conn, user.id, database_id)?;
            Ok::<_, ApiError>(databases::list_views(conn, database_id)?)
        })
        .await?;
    Ok(Json(views))
}

async fn create_view(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(input): Json<NewView>,
) -> ApiResult<Json<DatabaseView>> {
    require_text("name", &input.name)?;
    let view = state
        .store
        .call(move |conn| {
            access::require_database(conn, user.id, input.database_id)?;
            Ok::<_, ApiError>(databases::create_view(conn, user.id, &input)?)
        })
        .await?;
    Ok(Json(view))
}

async fn update_view(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Json(update): Json<ViewUpdate>,
) -> ApiResult<Json<DatabaseView>> {
    if let Some(name) = &update.name {
        require_text("name", name)?;
    }
    let view = state
        .store
        .call(move |conn| {
            access::require_view(conn, user.id, id)?;
            Ok::<_, ApiError>(databases::update_view(conn, id, &update)?)
        })
        .await?;
    Ok(Json(view))
}

async fn delete_view(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Success>> {
    state
        .store
        .call(move |conn| {
            access::require_view(conn, user.id, id)?;
            Ok::<_, ApiError>(databases::delete_view(conn, id)?)
        })
        .await?;
    Ok(Json(Success::ok()))
}

async fn list_items(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(database_id): Path<i64>,
) -> ApiResult<Json<Vec<DatabaseItem>>> {
    let items = state
        .store
        .call(move |conn| {
            access::require_database(conn, user.id, database_id)?;
            Ok::<_, ApiError>(databases::list_items(conn, database_id)?)
        })
        .await?;
    Ok(Json(items))
}

async fn get_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DatabaseItem>> {
    let (item, _) = state
        .store
        .call(move |conn| access::require_item(conn, user.id, id))
        .await?;
    Ok(Json(item))
}

async fn create_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(input): Json<NewItem>,
) -> ApiResult<Json<DatabaseItem>> {
    let (item, workspace_id) = state
        .store
        .call(move |conn| {
            let database = access::require_database(conn, user.id, input.database_id)?;
            let item = databases::create_item(conn, user.id, &input)?;
            Ok::<_, ApiError>((item, database.workspace_id))
        })
        .await?;

    state
        .automations
        .notify(AutomationEvent::new(
            TriggerKind::DatabaseItemCreated,
            workspace_id,
            user.id,
            "item",
            &item,
        ))
        .await;
    Ok(Json(item))
}

async fn update_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Json(update): Json<ItemUpdate>,
) -> ApiResult<Json<DatabaseItem>> {
    let (item, workspace_id, completed) = state
        .store
        .call(move |conn| {
            let (before, database) = access::require_item(conn, user.id, id)?;
            let item = databases::update_item(conn, id, &update)?;
            let completed = automation::task_completed(&before.properties, &item.properties);
            Ok::<_, ApiError>((item, database.workspace_id, completed))
        })
        .await?;

    if completed {
        state
            .automations
            .notify(AutomationEvent::new(
                TriggerKind::TaskCompleted,
                workspace_id,
                user.id,
                "item",
                &item,
            ))
            .await;
    }
    Ok(Json(item))
}

async fn archive_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Success>> {
    state
        .store
        .call(move |conn| {
            access::require_item(conn, user.id, id)?;
            Ok::<_, ApiError>(databases::archive_item(conn, id)?)
        })
        .await?;
    Ok(Json(Success::ok()))
}
