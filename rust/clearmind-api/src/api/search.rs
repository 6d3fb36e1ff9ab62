//! Global search endpoint.

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;

use crate::AppState;
use crate::access;
use crate::error::ApiResult;
use crate::gateway::AuthenticatedUser;
use crate::search::{self, SearchResult};
use crate::store::users;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/v1/search", get(search_handler))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchQuery {
    #[serde(default)]
    q: String,
    /// Defaults to the caller's oldest workspace.
    workspace_id: Option<i64>,
    limit: Option<usize>,
}

async fn search_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<Vec<SearchResult>>> {
    let query = params.q.trim().to_string();
    if query.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let limits = &state.config.search;
    let limit = params
        .limit
        .unwrap_or(limits.default_limit)
        .min(limits.max_limit);

    let results = state
        .store
        .call(move |conn| -> ApiResult<Vec<SearchResult>> {
            let workspace_id = match params.workspace_id {
                Some(id) => access::owned_workspace(conn, user.id, id)?.id,
                None => match users::primary_workspace_id(conn, user.id)? {
                    Some(id) => id,
                    None => return Ok(Vec::new()),
                },
            };
            Ok(search::global_search(conn, &query, workspace_id, user.id, limit)?)
        })
        .await?;
    tracing::debug!(results = results.len(), limit, "Search completed");
    Ok(Json(results))
}

