//! Realtime presence over WebSocket.

pub mod presence;
pub mod protocol;
pub mod socket;

use std::time::Duration;

use axum::{Router, routing::get};
use tokio::task::JoinHandle;

pub use presence::{ConnectionId, Envelope, PresenceHub, UserPresence};
pub use protocol::{ClientMessage, CursorPosition, ServerMessage, Viewer};

use crate::AppState;
use crate::logging::OpTimer;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(socket::websocket_handler))
}

/// Periodically evicts idle presences.
pub fn spawn_sweeper(hub: PresenceHub, every: Duration, idle: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let timer = OpTimer::new("realtime", "sweep");
            let evicted = hub.sweep(idle);
            if !evicted.is_empty() {
                tracing::info!(
                    evicted = evicted.len(),
                    remaining = hub.connection_count(),
                    "Evicted idle realtime connections"
                );
            }
            timer.finish();
        }
    })
}
