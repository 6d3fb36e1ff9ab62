//! Offline sync endpoints.

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::AppState;
use crate::domain::SyncMetadata;
use crate::error::{ApiError, ApiResult};
use crate::gateway::AuthenticatedUser;
use crate::sync::{self, PushRequest, PushResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/sync/push", post(push))
        .route("/api/v1/sync/changes", get(changes))
}

async fn push(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<PushRequest>,
) -> ApiResult<Json<PushResponse>> {
    let count = request.mutations.len();
    let (results, events) = state
        .store
        .call(move |conn| Ok::<_, ApiError>(sync::push(conn, user.id, &request.mutations)))
        .await?;

    tracing::info!(
        user_id = user.id,
        mutations = count,
        applied = results
            .iter()
            .filter(|r| r.status == sync::MutationStatus::Applied)
            .count(),
        "Sync batch processed"
    );
    for event in events {
        state.automations.notify(event).await;
    }
    Ok(Json(PushResponse {
        results,
        synced_at: Utc::now(),
    }))
}

#[derive(Debug, Deserialize)]
struct ChangesQuery {
    since: DateTime<Utc>,
}

async fn changes(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<ChangesQuery>,
) -> ApiResult<Json<Vec<SyncMetadata>>> {
    let list = state
        .store
        .call(move |conn| sync::changes_since(conn, user.id, query.since))
        .await?;
    Ok(Json(list))
}
