//! Timeline endpoints. Events belong to the caller.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use super::{Success, require_text};
use crate::AppState;
use crate::access;
use crate::automation::AutomationEvent;
use crate::domain::{EventUpdate, NewEvent, TimelineEvent, TriggerKind};
use crate::error::{ApiError, ApiResult};
use crate::gateway::AuthenticatedUser;
use crate::store::{timeline, users};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/timeline", get(list_events).post(create_event))
        .route("/api/v1/timeline/{id}", patch(update_event).delete(delete_event))
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    /// `YYYY-MM-DD`; today (UTC) when absent.
    date: Option<NaiveDate>,
}

async fn list_events(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<Vec<TimelineEvent>>> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let events = state
        .store
        .call(move |conn| timeline::list_events_on_date(conn, user.id, date))
        .await?;
    Ok(Json(events))
}

async fn create_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(input): Json<NewEvent>,
) -> ApiResult<Json<TimelineEvent>> {
    require_text("title", &input.title)?;
    let event = state
        .store
        .call(move |conn| timeline::create_event(conn, user.id, &input))
        .await?;
    Ok(Json(event))
}

async fn update_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Json(update): Json<EventUpdate>,
) -> ApiResult<Json<TimelineEvent>> {
    if let Some(title) = &update.title {
        require_text("title", title)?;
    }
    let (event, workspace_id) = state
        .store
        .call(move |conn| {
            access::require_event(conn, user.id, id)?;
            let (event, newly_completed) = timeline::update_event(conn, id, &update)?;
            let workspace_id = if newly_completed {
                users::primary_workspace_id(conn, user.id)?
            } else {
                None
            };
            Ok::<_, ApiError>((event, workspace_id))
        })
        .await?;

    if let Some(workspace_id) = workspace_id {
        state
            .automations
            .notify(AutomationEvent::new(
                TriggerKind::TimelineEventCompleted,
                workspace_id,
                user.id,
                "event",
                &event,
            ))
            .await;
    }
    Ok(Json(event))
}

async fn delete_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Success>> {
    state
        .store
        .call(move |conn| {
            access::require_event(conn, user.id, id)?;
            Ok::<_, ApiError>(timeline::delete_event(conn, id)?)
        })
        .await?;
    Ok(Json(Success::ok()))
}
