//! HTTP server setup and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::HeaderValue;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::api;
use crate::assistant::{OpenAiAssistant, WritingAssistant};
use crate::automation::AutomationEngine;
use crate::config::{AppConfig, ServerConfig};
use crate::gateway::{self, UserRateLimiters};
use crate::logging::OpTimer;
use crate::realtime::{self, PresenceHub};
use crate::store::Store;
use crate::{AppState, log_banner, log_init_step, log_init_warning, log_success};

/// ClearMind API version (from Cargo.toml).
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds the shared state and opens the store.
pub fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    // [1/5] Store
    let step_timer = OpTimer::new("server", "store");
    let store = Store::open(&config.database.path)?;
    log_init_step!(1, 5, "Store", format!("🗄️  SQLite at {}", store.path()));
    step_timer.finish();

    // [2/5] Presence hub
    let presence = PresenceHub::new(config.realtime.room_capacity);
    log_init_step!(
        2,
        5,
        "Presence",
        format!(
            "👥 idle timeout {}s, sweep every {}s",
            config.realtime.idle_timeout_secs, config.realtime.sweep_interval_secs
        )
    );

    // [3/5] Writing assistant
    let step_timer = OpTimer::new("server", "assistant");
    let assistant = OpenAiAssistant::new(config.assistant.clone())?;
    let assistant_info = format!(
        "✍️  {} ({}) {}",
        config.assistant.model,
        config.assistant.base_url,
        if assistant.is_configured() {
            "✓"
        } else {
            "✗ No API key"
        }
    );
    log_init_step!(3, 5, "Assistant", assistant_info);
    if !assistant.is_configured() {
        log_init_warning!("No assistant API key configured. AI endpoints will return 502.");
    }
    step_timer.finish();

    // [4/5] Rate limiting
    let rate_limiters = Arc::new(UserRateLimiters::from_config(&config.rate_limit));
    let rate_info = if rate_limiters.is_enabled() {
        format!(
            "🚦 {} req/min, burst {}",
            config.rate_limit.per_minute, config.rate_limit.burst
        )
    } else {
        "🚦 Disabled".to_string()
    };
    log_init_step!(4, 5, "Rate Limiting", rate_info);

    let assistant: Arc<dyn WritingAssistant> = Arc::new(assistant);
    Ok(AppState {
        config: Arc::new(config),
        automations: AutomationEngine::new(store.clone()),
        store,
        presence,
        assistant,
        rate_limiters,
    })
}

/// Assembles routes and middleware around an existing state.
pub fn build_router(state: AppState) -> Router {
    let server = &state.config.server;
    let cors = cors_layer(server);
    let timeout = Duration::from_secs(server.timeout_secs);

    Router::new()
        .merge(api::create_router())
        .merge(gateway::create_router())
        .merge(realtime::router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            gateway::user_rate_limit_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            gateway::auth_middleware,
        ))
        // CORS outermost so preflight requests never reach auth.
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .map_response(|res: axum::http::Response<_>| res.map(axum::body::Body::new))
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    axum::http::StatusCode::REQUEST_TIMEOUT,
                    timeout,
                )),
        )
        .with_state(state)
}

/// Any origin when none are configured; otherwise the listed origins with
/// credentials so the session cookie is sent.
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    if server.cors_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Create the application with all routes and middleware.
pub async fn create_app(config: AppConfig) -> anyhow::Result<Router> {
    let overall_timer = OpTimer::new("server", "create_app");

    log_banner!(
        format!("🧠 ClearMind API v{VERSION}"),
        format!("Store: {}", config.database.path)
    );

    let state = build_state(config)?;

    let realtime_config = &state.config.realtime;
    realtime::spawn_sweeper(
        state.presence.clone(),
        Duration::from_secs(realtime_config.sweep_interval_secs.max(1)),
        Duration::from_secs(realtime_config.idle_timeout_secs),
    );

    if state.rate_limiters.is_enabled() {
        gateway::rate_limit::spawn_pruner(
            Arc::clone(&state.rate_limiters),
            Duration::from_secs(realtime_config.sweep_interval_secs.max(1)),
        );
    }

    // [5/5] Router
    let step_timer = OpTimer::new("server", "router");
    let app = build_router(state);
    log_init_step!(5, 5, "Router", "🌐 Routes + middleware configured");
    step_timer.finish();

    overall_timer.finish();
    log_success!("ClearMind API server created successfully");

    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_builds_from_test_config() {
        let state = build_state(AppConfig::for_tests()).unwrap();
        assert_eq!(state.store.path(), ":memory:");
        assert!(!state.rate_limiters.is_enabled());
        assert_eq!(state.presence.connection_count(), 0);
    }

    #[test]
    fn configured_origins_allow_credentials() {
        let mut server = ServerConfig::default();
        server.cors_origins = vec!["http://localhost:5173".to_string()];
        // CorsLayer checks its rules when wrapping a service.
        let _service = tower::Layer::layer(
            &cors_layer(&server),
            tower::service_fn(|_req: axum::extract::Request| async {
                Ok::<_, std::convert::Infallible>(axum::response::Response::new(axum::body::Body::empty()))
            }),
        );
    }
}
