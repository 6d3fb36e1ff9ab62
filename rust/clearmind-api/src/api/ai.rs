//! Writing assistant endpoints.

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiResult;
use crate::logging::OpTimer;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/ai/breakdown-task", post(breakdown_task))
        .route("/api/v1/ai/improve-writing", post(improve_writing))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BreakdownRequest {
    task_description: String,
}

#[derive(Debug, Serialize)]
struct BreakdownResponse {
    subtasks: Vec<String>,
}

async fn breakdown_task(
    State(state): State<AppState>,
    Json(request): Json<BreakdownRequest>,
) -> ApiResult<Json<BreakdownResponse>> {
    let timer = OpTimer::new("assistant", "breakdown_task");
    let result = state.assistant.breakdown_task(&request.task_description).await;
    timer.finish_with_result(result.as_ref());
    Ok(Json(BreakdownResponse { subtasks: result? }))
}

#[derive(Debug, Deserialize)]
struct ImproveRequest {
    text: String,
    #[serde(default)]
    instruction: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImproveResponse {
    improved_text: String,
}

async fn improve_writing(
    State(state): State<AppState>,
    Json(request): Json<ImproveRequest>,
) -> ApiResult<Json<ImproveResponse>> {
    let timer = OpTimer::new("assistant", "improve_writing");
    let result = state
        .assistant
        .improve_writing(&request.text, &request.instruction)
        .await;
    timer.finish_with_result(result.as_ref());
    Ok(Json(ImproveResponse { improved_text: result? }))
}
