//! ClearMind API - workspace backend for the ClearMind notes app
//!
//! This crate serves the ClearMind web client: a Notion-style workspace of
//! pages and blocks, structured databases, a daily timeline, mood tracking
//! and collaboration features, all backed by a single SQLite file.
//!
//! - **Content**: nested pages, ordered blocks, archive and restore
//! - **Databases**: JSON schemas, typed views and items
//! - **Tracking**: timeline events and mood entries with summaries
//! - **Collaboration**: comments with mentions, notifications, page shares
//! - **Realtime**: page presence, typing and cursor broadcast over WebSocket
//! - **Offline sync**: versioned mutation replay with stale-write detection
//! - **Automations**: trigger/condition/action rules run after writes
//!
//! # Architecture
//!
//! - [`config`]: Configuration management and environment loading
//! - [`gateway`]: Session tokens, authentication and rate limiting
//! - [`store`]: SQLite persistence
//! - [`access`]: Ownership and share checks
//! - [`api`]: HTTP API endpoints
//! - [`realtime`]: WebSocket presence hub
//! - [`sync`]: Offline mutation replay
//! - [`automation`]: Automation engine
//! - [`assistant`]: AI writing helpers
//!
//! # Example
//!
//! ```rust,ignore
//! use clearmind_api::{config::AppConfig, server::create_app};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let app = create_app(config).await?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod access;
pub mod api;
pub mod assistant;
pub mod automation;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod realtime;
pub mod search;
pub mod server;
pub mod store;
pub mod sync;
pub mod templates;

use std::sync::Arc;

use assistant::WritingAssistant;
use automation::AutomationEngine;
use config::AppConfig;
use gateway::UserRateLimiters;
use realtime::PresenceHub;
use store::Store;

/// Product name reported by `/api/v1/info`.
pub const APP_NAME: &str = "ClearMind";

/// Default session cookie name.
pub const COOKIE_NAME: &str = "clearmind_session";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// SQLite store.
    pub store: Store,
    /// Who is connected and which page they are viewing.
    pub presence: PresenceHub,
    /// Runs automations after writes.
    pub automations: AutomationEngine,
    /// AI writing helpers.
    pub assistant: Arc<dyn WritingAssistant>,
    /// Per-user request limiters.
    pub rate_limiters: Arc<UserRateLimiters>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &"AppConfig")
            .field("store", &self.store)
            .field("connections", &self.presence.connection_count())
            .field("assistant", &self.assistant)
            .field("rate_limiting", &self.rate_limiters.is_enabled())
            .finish_non_exhaustive()
    }
}
