//! Automation rule endpoints.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    routing::{get, patch, post},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{Success, require_text};
use crate::AppState;
use crate::access;
use crate::automation::AutomationReport;
use crate::domain::{Automation, AutomationUpdate, NewAutomation};
use crate::error::{ApiError, ApiResult};
use crate::gateway::AuthenticatedUser;
use crate::store::automations;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/automations", get(list_automations).post(create_automation))
        .route(
            "/api/v1/automations/{id}",
            patch(update_automation).delete(delete_automation),
        )
        .route("/api/v1/automations/{id}/test", post(test_automation))
}

async fn list_automations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Vec<Automation>>> {
    let list = state
        .store
        .call(move |conn| automations::list_automations_by_user(conn, user.id))
        .await?;
    Ok(Json(list))
}

async fn create_automation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(input): Json<NewAutomation>,
) -> ApiResult<Json<Automation>> {
    require_text("name", &input.name)?;
    let automation = state
        .store
        .call(move |conn| {
            access::owned_workspace(conn, user.id, input.workspace_id)?;
            Ok::<_, ApiError>(automations::create_automation(conn, user.id, &input)?)
        })
        .await?;
    tracing::info!(
        automation_id = automation.id,
        trigger = %automation.trigger,
        "Automation created"
    );
    Ok(Json(automation))
}

async fn update_automation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Json(update): Json<AutomationUpdate>,
) -> ApiResult<Json<Automation>> {
    if let Some(name) = &update.name {
        require_text("name", name)?;
    }
    let automation = state
        .store
        .call(move |conn| {
            access::require_automation(conn, user.id, id)?;
            Ok::<_, ApiError>(automations::update_automation(conn, id, &update)?)
        })
        .await?;
    Ok(Json(automation))
}

async fn delete_automation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Success>> {
    state
        .store
        .call(move |conn| {
            access::require_automation(conn, user.id, id)?;
            Ok::<_, ApiError>(automations::delete_automation(conn, id)?)
        })
        .await?;
    Ok(Json(Success::ok()))
}

#[derive(Debug, Default, Deserialize)]
struct TestRequest {
    #[serde(default)]
    payload: Value,
}

/// Fills in the `user` and `trigger` keys real events carry.
fn sample_payload(automation: &Automation, user_id: i64, payload: Value) -> Value {
    let mut payload = match payload {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    payload.entry("user").or_insert_with(|| json!({ "id": user_id }));
    payload
        .entry("trigger")
        .or_insert_with(|| json!(automation.trigger.as_str()));
    Value::Object(payload)
}

async fn test_automation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    body: Option<Json<TestRequest>>,
) -> ApiResult<Json<AutomationReport>> {
    let Json(request) = body.unwrap_or_default();
    let automation = state
        .store
        .call(move |conn| access::require_automation(conn, user.id, id))
        .await?;
    let payload = sample_payload(&automation, user.id, request.payload);
    let report = state.automations.test(automation, payload).await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TriggerKind;
    use chrono::Utc;

    #[test]
    fn sample_payload_keeps_caller_fields() {
        let now = Utc::now();
        let automation = Automation {
            id: 1,
            workspace_id: 1,
            name: "n".to_string(),
            trigger: TriggerKind::MoodLogged,
            conditions: Vec::new(),
            actions: Vec::new(),
            enabled: true,
            created_by: 4,
            created_at: now,
            updated_at: now,
        };
        let payload = sample_payload(&automation, 4, json!({"mood": {"moodValue": 2}, "user": {"id": 9}}));
        assert_eq!(payload["mood"]["moodValue"], 2);
        assert_eq!(payload["user"]["id"], 9);
        assert_eq!(payload["trigger"], "mood_logged");

        let empty = sample_payload(&automation, 4, Value::Null);
        assert_eq!(empty["user"]["id"], 4);
    }
}
