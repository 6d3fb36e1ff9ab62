//! Mood tracking endpoints.

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::LimitQuery;
use crate::AppState;
use crate::automation::AutomationEvent;
use crate::domain::{MoodEntry, MoodSummary, NewMoodEntry, TriggerKind};
use crate::error::{ApiError, ApiResult};
use crate::gateway::AuthenticatedUser;
use crate::store::{mood, users};

const DEFAULT_SUMMARY_DAYS: i64 = 7;
const MAX_SUMMARY_DAYS: i64 = 365;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/mood", get(list_entries).post(create_entry))
        .route("/api/v1/mood/recent", get(recent))
        .route("/api/v1/mood/summary", get(summary))
}

async fn create_entry(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(input): Json<NewMoodEntry>,
) -> ApiResult<Json<MoodEntry>> {
    input.validate().map_err(ApiError::bad_request)?;
    let (entry, workspace_id) = state
        .store
        .call(move |conn| {
            let entry = mood::create_mood_entry(conn, user.id, &input)?;
            let workspace_id = users::primary_workspace_id(conn, user.id)?;
            Ok::<_, ApiError>((entry, workspace_id))
        })
        .await?;

    if let Some(workspace_id) = workspace_id {
        state
            .automations
            .notify(AutomationEvent::new(
                TriggerKind::MoodLogged,
                workspace_id,
                user.id,
                "mood",
                &entry,
            ))
            .await;
    }
    Ok(Json(entry))
}

#[derive(Debug, Deserialize)]
struct RangeQuery {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

async fn list_entries(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(range): Query<RangeQuery>,
) -> ApiResult<Json<Vec<MoodEntry>>> {
    if range.end < range.start {
        return Err(ApiError::bad_request("end must not be before start"));
    }
    let entries = state
        .store
        .call(move |conn| mood::list_mood_entries(conn, user.id, range.start, range.end))
        .await?;
    Ok(Json(entries))
}

async fn recent(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<MoodEntry>>> {
    let limit = query.limit.unwrap_or(mood::DEFAULT_RECENT_LIMIT).clamp(1, 500);
    let entries = state
        .store
        .call(move |conn| mood::list_recent_mood(conn, user.id, limit))
        .await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
struct DaysQuery {
    days: Option<i64>,
}

async fn summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<DaysQuery>,
) -> ApiResult<Json<MoodSummary>> {
    let days = query.days.unwrap_or(DEFAULT_SUMMARY_DAYS).clamp(1, MAX_SUMMARY_DAYS);
    let summary = state
        .store
        .call(move |conn| mood::mood_summary(conn, user.id, days))
        .await?;
    Ok(Json(summary))
}
