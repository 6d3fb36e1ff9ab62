//! Template catalogue and instantiation.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::access;
use crate::automation::AutomationEvent;
use crate::domain::{Block, Page, SharePermission, TriggerKind};
use crate::error::{ApiError, ApiResult};
use crate::gateway::AuthenticatedUser;
use crate::store::StoreError;
use crate::templates::{
    self, DATABASE_TEMPLATES, DatabaseTemplate, InstantiatedDatabase, PAGE_TEMPLATES, PageTemplate,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/templates/pages", get(list_page_templates))
        .route("/api/v1/templates/databases", get(list_database_templates))
        .route("/api/v1/templates/pages/{id}/instantiate", post(instantiate_page))
        .route(
            "/api/v1/templates/databases/{id}/instantiate",
            post(instantiate_database),
        )
}

async fn list_page_templates() -> Json<&'static [PageTemplate]> {
    Json(PAGE_TEMPLATES)
}

async fn list_database_templates() -> Json<&'static [DatabaseTemplate]> {
    Json(DATABASE_TEMPLATES.as_slice())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstantiatePage {
    workspace_id: i64,
    #[serde(default)]
    parent_id: Option<i64>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Serialize)]
struct InstantiatedPage {
    page: Page,
    blocks: Vec<Block>,
}

/// Drops blank overrides so the template default applies.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn instantiate_page(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    Json(request): Json<InstantiatePage>,
) -> ApiResult<Json<InstantiatedPage>> {
    let template = templates::page_template(&id)
        .ok_or_else(|| ApiError::not_found(format!("page template '{id}' not found")))?;
    let (page, blocks) = state
        .store
        .call(move |conn| -> ApiResult<(Page, Vec<Block>)> {
            match request.parent_id {
                Some(parent_id) => {
                    let parent = access::require_page(conn, user.id, parent_id, SharePermission::Edit)?;
                    if parent.workspace_id != request.workspace_id {
                        return Err(ApiError::bad_request("parent page belongs to another workspace"));
                    }
                }
                None => {
                    access::owned_workspace(conn, user.id, request.workspace_id)?;
                }
            }
            let tx = conn.transaction().map_err(StoreError::from)?;
            let created = templates::instantiate_page(
                &tx,
                user.id,
                template,
                request.workspace_id,
                request.parent_id,
                non_blank(request.title),
            )?;
            tx.commit().map_err(StoreError::from)?;
            Ok(created)
        })
        .await?;

    tracing::info!(template = %id, page_id = page.id, blocks = blocks.len(), "Page template instantiated");
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
    Ok(Json(InstantiatedPage { page, blocks }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstantiateDatabase {
    workspace_id: i64,
    #[serde(default)]
    name: Option<String>,
}

async fn instantiate_database(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    Json(request): Json<InstantiateDatabase>,
) -> ApiResult<Json<InstantiatedDatabase>> {
    let template = templates::database_template(&id)
        .ok_or_else(|| ApiError::not_found(format!("database template '{id}' not found")))?;
    let created = state
        .store
        .call(move |conn| -> ApiResult<InstantiatedDatabase> {
            access::owned_workspace(conn, user.id, request.workspace_id)?;
            let tx = conn.transaction().map_err(StoreError::from)?;
            let created = templates::instantiate_database(
                &tx,
                user.id,
                template,
                request.workspace_id,
                non_blank(request.name),
            )?;
            tx.commit().map_err(StoreError::from)?;
            Ok(created)
        })
        .await?;
    tracing::info!(
        template = %id,
        database_id = created.database.id,
        items = created.items.len(),
        "Database template instantiated"
    );
    Ok(Json(created))
}
