//! Health check endpoints.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use crate::AppState;

/// Create the health router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/api/v1/info", get(info))
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Basic health check.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadinessResponse {
    status: &'static str,
    store: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema_version: Option<i64>,
    assistant: bool,
}

/// Readiness: the store answers a query.
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let assistant = state.config.assistant.api_key.is_some();
    match state.store.ping().await {
        Ok(version) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                store: true,
                schema_version: Some(version),
                assistant,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "unavailable",
                    store: false,
                    schema_version: None,
                    assistant,
                }),
            )
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoResponse {
    name: &'static str,
    version: &'static str,
    cookie_name: String,
    realtime_path: &'static str,
}

async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: crate::APP_NAME,
        version: env!("CARGO_PKG_VERSION"),
        cookie_name: state.config.auth.cookie_name.clone(),
        realtime_path: "/ws",
    })
}
