//! HTTP API endpoints under `/api/v1`.

pub mod ai;
pub mod automations;
pub mod comments;
pub mod databases;
pub mod health;
pub mod mood;
pub mod notifications;
pub mod pages;
pub mod search;
pub mod shares;
pub mod sync;
pub mod templates;
pub mod timeline;
pub mod workspaces;

use axum::Router;
use serde::{Deserialize, Serialize};

use crate::AppState;

pub(crate) use crate::access::require_text;

/// Create the API router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(workspaces::router())
        .merge(pages::router())
        .merge(databases::router())
        .merge(timeline::router())
        .merge(mood::router())
        .merge(notifications::router())
        .merge(comments::router())
        .merge(automations::router())
        .merge(shares::router())
        .merge(search::router())
        .merge(sync::router())
        .merge(templates::router())
        .merge(ai::router())
}

/// `{ "success": true }`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Success {
    pub success: bool,
}

impl Success {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// `?limit=` query shared by list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}
