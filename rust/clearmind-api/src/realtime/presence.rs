//! In-memory presence: who is connected and which page they are looking at.
//!
//! ```text
//! connection ──register──▶ PresenceHub ──global channel──▶ every connection
//!            ──view page──▶   rooms[page] ──room channel──▶ page viewers
//! ```
//!
//! Room channels are created when the first viewer arrives and dropped with
//! the last one. Messages carry the sender's connection id so a socket can
//! skip its own echoes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{Notify, broadcast};
use uuid::Uuid;

use super::protocol::{CursorPosition, ServerMessage, Viewer};

pub type ConnectionId = String;

/// A message on a room or global channel.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Connection that must not receive this message.
    pub skip: Option<ConnectionId>,
    pub message: Arc<ServerMessage>,
}

impl Envelope {
    fn to_all(message: ServerMessage) -> Self {
        Self {
            skip: None,
            message: Arc::new(message),
        }
    }

    fn to_others(sender: &str, message: ServerMessage) -> Self {
        Self {
            skip: Some(sender.to_string()),
            message: Arc::new(message),
        }
    }

    /// Whether `connection` should see this message.
    pub fn is_for(&self, connection: &str) -> bool {
        self.skip.as_deref() != Some(connection)
    }
}

#[derive(Debug, Clone)]
pub struct UserPresence {
    pub user_id: i64,
    pub user_name: String,
    pub page_id: Option<i64>,
    pub is_typing: bool,
    pub cursor: Option<CursorPosition>,
    pub last_active: Instant,
    kick: Arc<Notify>,
}

#[derive(Debug)]
struct Room {
    viewers: HashSet<ConnectionId>,
    tx: broadcast::Sender<Envelope>,
}

#[derive(Debug, Default)]
struct HubState {
    connections: HashMap<ConnectionId, UserPresence>,
    rooms: HashMap<i64, Room>,
}

/// Handle returned on registration.
#[derive(Debug)]
pub struct Registration {
    pub connection_id: ConnectionId,
    pub global: broadcast::Receiver<Envelope>,
    /// Fires when the sweeper evicts this connection.
    pub kicked: Arc<Notify>,
}

#[derive(Debug, Clone)]
pub struct PresenceHub {
    state: Arc<RwLock<HubState>>,
    global: broadcast::Sender<Envelope>,
    capacity: usize,
}

impl PresenceHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (global, _rx) = broadcast::channel(capacity);
        Self {
            state: Arc::new(RwLock::new(HubState::default())),
            global,
            capacity,
        }
    }

    /// Adds a connection and announces it to everyone else.
    pub fn register(&self, user_id: i64, user_name: &str) -> Registration {
        let connection_id = Uuid::new_v4().to_string();
        let kicked = Arc::new(Notify::new());

        self.state.write().connections.insert(
            connection_id.clone(),
            UserPresence {
                user_id,
                user_name: user_name.to_string(),
                page_id: None,
                is_typing: false,
                cursor: None,
                last_active: Instant::now(),
                kick: Arc::clone(&kicked),
            },
        );

        let _ = self.global.send(Envelope::to_others(
            &connection_id,
            ServerMessage::UserJoined {
                user_id,
                user_name: user_name.to_string(),
            },
        ));
        let global = self.global.subscribe();
        tracing::debug!(connection_id = %connection_id, user_id, "Presence registered");

        Registration {
            connection_id,
            global,
            kicked,
        }
    }

    /// Marks activity on a connection.
    pub fn touch(&self, connection: &str) {
        if let Some(presence) = self.state.write().connections.get_mut(connection) {
            presence.last_active = Instant::now();
        }
    }

    /// Moves the connection into `page_id`'s room and returns a receiver for
    /// it. Both the old and new rooms get fresh viewer lists.
    pub fn view_page(&self, connection: &str, page_id: i64) -> Option<broadcast::Receiver<Envelope>> {
        let mut state = self.state.write();
        let previous = {
            let presence = state.connections.get_mut(connection)?;
            let previous = presence.page_id.replace(page_id);
            presence.is_typing = false;
            presence.cursor = None;
            presence.last_active = Instant::now();
            previous
        };

        if let Some(old) = previous.filter(|old| *old != page_id) {
            Self::remove_viewer(&mut state, old, connection);
        }

        let capacity = self.capacity;
        let room = state.rooms.entry(page_id).or_insert_with(|| Room {
            viewers: HashSet::new(),
            tx: broadcast::channel(capacity).0,
        });
        room.viewers.insert(connection.to_string());
        let rx = room.tx.subscribe();
        Self::broadcast_viewers(&state, page_id);
        Some(rx)
    }

    /// Takes the connection out of its room.
    pub fn leave_page(&self, connection: &str) {
        let mut state = self.state.write();
        let Some(presence) = state.connections.get_mut(connection) else {
            return;
        };
        let Some(page_id) = presence.page_id.take() else {
            return;
        };
        presence.is_typing = false;
        presence.cursor = None;
        let left = ServerMessage::UserLeft {
            user_id: presence.user_id,
            user_name: presence.user_name.clone(),
        };
        if let Some(room) = state.rooms.get(&page_id) {
            let _ = room.tx.send(Envelope::to_others(connection, left));
        }
        Self::remove_viewer(&mut state, page_id, connection);
    }

    /// Updates typing state; ignored unless the connection is viewing `page_id`.
    pub fn set_typing(&self, connection: &str, page_id: i64, is_typing: bool) -> bool {
        self.with_room(connection, page_id, |presence| {
            presence.is_typing = is_typing;
            ServerMessage::UserTyping {
                user_id: presence.user_id,
                user_name: presence.user_name.clone(),
                is_typing,
            }
        })
    }

    pub fn move_cursor(&self, connection: &str, page_id: i64, position: CursorPosition) -> bool {
        self.with_room(connection, page_id, |presence| {
            presence.cursor = Some(position);
            ServerMessage::CursorUpdate {
                user_id: presence.user_id,
                user_name: presence.user_name.clone(),
                position,
            }
        })
    }

    pub fn update_content(&self, connection: &str, page_id: i64, content: Value) -> bool {
        self.with_room(connection, page_id, |presence| ServerMessage::ContentChanged {
            user_id: presence.user_id,
            user_name: presence.user_name.clone(),
            content,
            timestamp: Utc::now(),
        })
    }

    /// Removes a connection, refreshing its room and telling everyone.
    pub fn disconnect(&self, connection: &str) -> Option<UserPresence> {
        let mut state = self.state.write();
        let presence = state.connections.remove(connection)?;
        if let Some(page_id) = presence.page_id {
            Self::remove_viewer(&mut state, page_id, connection);
        }
        let _ = self.global.send(Envelope::to_others(
            connection,
            ServerMessage::UserLeft {
                user_id: presence.user_id,
                user_name: presence.user_name.clone(),
            },
        ));
        tracing::debug!(connection_id = %connection, user_id = presence.user_id, "Presence removed");
        Some(presence)
    }

    /// Evicts connections idle for longer than `idle`. Returns their ids.
    pub fn sweep(&self, idle: Duration) -> Vec<ConnectionId> {
        let stale: Vec<ConnectionId> = {
            let state = self.state.read();
            state
                .connections
                .iter()
                .filter(|(_, presence)| presence.last_active.elapsed() > idle)
                .map(|(id, _)| id.clone())
                .collect()
        };
        for id in &stale {
            if let Some(presence) = self.disconnect(id) {
                presence.kick.notify_one();
            }
        }
        stale
    }

    /// Current viewers of a page, sorted by user id.
    #[must_use]
    pub fn viewers(&self, page_id: i64) -> Vec<Viewer> {
        Self::collect_viewers(&self.state.read(), page_id)
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.state.read().connections.len()
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.state.read().rooms.len()
    }

    fn with_room(
        &self,
        connection: &str,
        page_id: i64,
        build: impl FnOnce(&mut UserPresence) -> ServerMessage,
    ) -> bool {
        let mut state = self.state.write();
        let message = match state.connections.get_mut(connection) {
            Some(presence) if presence.page_id == Some(page_id) => {
                presence.last_active = Instant::now();
                build(presence)
            }
            _ => return false,
        };
        if let Some(room) = state.rooms.get(&page_id) {
            let _ = room.tx.send(Envelope::to_others(connection, message));
        }
        true
    }

    fn remove_viewer(state: &mut HubState, page_id: i64, connection: &str) {
        let now_empty = match state.rooms.get_mut(&page_id) {
            Some(room) => {
                room.viewers.remove(connection);
                room.viewers.is_empty()
            }
            None => return,
        };
        if now_empty {
            state.rooms.remove(&page_id);
        } else {
            Self::broadcast_viewers(state, page_id);
        }
    }

    fn collect_viewers(state: &HubState, page_id: i64) -> Vec<Viewer> {
        let Some(room) = state.rooms.get(&page_id) else {
            return Vec::new();
        };
        let mut viewers: Vec<Viewer> = room
            .viewers
            .iter()
            .filter_map(|id| state.connections.get(id))
            .map(|presence| Viewer {
                user_id: presence.user_id,
                user_name: presence.user_name.clone(),
                is_typing: presence.is_typing,
            })
            .collect();
        viewers.sort_by_key(|viewer| viewer.user_id);
        viewers
    }

    fn broadcast_viewers(state: &HubState, page_id: i64) {
        if let Some(room) = state.rooms.get(&page_id) {
            let viewers = Self::collect_viewers(state, page_id);
            let _ = room
                .tx
                .send(Envelope::to_all(ServerMessage::PageViewers { page_id, viewers }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn next(rx: &mut broadcast::Receiver<Envelope>) -> ServerMessage {
        (*rx.try_recv().unwrap().message).clone()
    }

    #[test]
    fn joining_is_announced_to_others_only() {
        let hub = PresenceHub::new(16);
        let mut ada = hub.register(1, "Ada");
        let bob = hub.register(2, "Bob");

        let envelope = ada.global.try_recv().unwrap();
        assert!(envelope.is_for(&ada.connection_id));
        assert!(!envelope.is_for(&bob.connection_id));
        assert_eq!(
            *envelope.message,
            ServerMessage::UserJoined {
                user_id: 2,
                user_name: "Bob".to_string()
            }
        );
        assert_eq!(hub.connection_count(), 2);
    }

    #[test]
    fn switching_pages_updates_both_rooms() {
        let hub = PresenceHub::new(16);
        let ada = hub.register(1, "Ada");
        let bob = hub.register(2, "Bob");

        let mut ada_room = hub.view_page(&ada.connection_id, 10).unwrap();
        let mut bob_room = hub.view_page(&bob.connection_id, 10).unwrap();
        assert_eq!(hub.viewers(10).len(), 2);

        // Ada saw herself join, then Bob.
        let ServerMessage::PageViewers { viewers, .. } = next(&mut ada_room) else {
            panic!("expected viewers");
        };
        assert_eq!(viewers.len(), 1);
        let ServerMessage::PageViewers { viewers, .. } = next(&mut ada_room) else {
            panic!("expected viewers");
        };
        assert_eq!(viewers.len(), 2);
        let _ = next(&mut bob_room);

        hub.view_page(&bob.connection_id, 20).unwrap();
        let ServerMessage::PageViewers { page_id, viewers } = next(&mut ada_room) else {
            panic!("expected viewers");
        };
        assert_eq!(page_id, 10);
        assert_eq!(viewers.len(), 1);
        assert_eq!(hub.viewers(20).len(), 1);
        assert_eq!(hub.room_count(), 2);

        hub.leave_page(&ada.connection_id);
        assert_eq!(hub.room_count(), 1);
    }

    #[test]
    fn messages_for_other_pages_are_ignored() {
        let hub = PresenceHub::new(16);
        let ada = hub.register(1, "Ada");
        let bob = hub.register(2, "Bob");
        hub.view_page(&ada.connection_id, 10).unwrap();
        let mut bob_room = hub.view_page(&bob.connection_id, 10).unwrap();
        while bob_room.try_recv().is_ok() {}

        assert!(!hub.set_typing(&ada.connection_id, 99, true));
        assert!(hub.set_typing(&ada.connection_id, 10, true));
        let envelope = bob_room.try_recv().unwrap();
        assert!(!envelope.is_for(&ada.connection_id));
        assert!(matches!(
            *envelope.message,
            ServerMessage::UserTyping { is_typing: true, .. }
        ));
        assert!(hub.viewers(10).iter().any(|v| v.user_id == 1 && v.is_typing));
    }

    #[test]
    fn disconnect_drops_empty_rooms() {
        let hub = PresenceHub::new(16);
        let ada = hub.register(1, "Ada");
        hub.view_page(&ada.connection_id, 10).unwrap();
        let removed = hub.disconnect(&ada.connection_id).unwrap();
        assert_eq!(removed.page_id, Some(10));
        assert_eq!(hub.room_count(), 0);
        assert_eq!(hub.connection_count(), 0);
        assert!(hub.disconnect(&ada.connection_id).is_none());
    }

    #[tokio::test]
    async fn sweep_evicts_idle_connections_and_kicks_them() {
        let hub = PresenceHub::new(16);
        let ada = hub.register(1, "Ada");
        let bob = hub.register(2, "Bob");
        tokio::time::sleep(Duration::from_millis(30)).await;
        hub.touch(&bob.connection_id);

        let evicted = hub.sweep(Duration::from_millis(20));
        assert_eq!(evicted, vec![ada.connection_id.clone()]);
        assert_eq!(hub.connection_count(), 1);
        tokio::time::timeout(Duration::from_millis(100), ada.kicked.notified())
            .await
            .unwrap();
    }
}
