//! WebSocket message shapes, tagged by `type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages sent by clients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "page:view", rename_all = "camelCase")]
    PageView { page_id: i64 },

    #[serde(rename = "page:leave")]
    PageLeave,

    #[serde(rename = "typing:start", rename_all = "camelCase")]
    TypingStart { page_id: i64 },

    #[serde(rename = "typing:stop", rename_all = "camelCase")]
    TypingStop { page_id: i64 },

    #[serde(rename = "cursor:move", rename_all = "camelCase")]
    CursorMove { page_id: i64, x: f64, y: f64 },

    #[serde(rename = "content:update", rename_all = "camelCase")]
    ContentUpdate { page_id: i64, content: Value },

    #[serde(rename = "ping")]
    Ping,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub user_id: i64,
    pub user_name: String,
    pub is_typing: bool,
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "connected", rename_all = "camelCase")]
    Connected { connection_id: String },

    #[serde(rename = "user:joined", rename_all = "camelCase")]
    UserJoined { user_id: i64, user_name: String },

    #[serde(rename = "page:viewers", rename_all = "camelCase")]
    PageViewers { page_id: i64, viewers: Vec<Viewer> },

    #[serde(rename = "user:typing", rename_all = "camelCase")]
    UserTyping {
        user_id: i64,
        user_name: String,
        is_typing: bool,
    },

    #[serde(rename = "cursor:update", rename_all = "camelCase")]
    CursorUpdate {
        user_id: i64,
        user_name: String,
        position: CursorPosition,
    },

    #[serde(rename = "content:changed", rename_all = "camelCase")]
    ContentChanged {
        user_id: i64,
        user_name: String,
        content: Value,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "user:left", rename_all = "camelCase")]
    UserLeft { user_id: i64, user_name: String },

    #[serde(rename = "pong")]
    Pong,

    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_messages_use_colon_tags() {
        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "cursor:move", "pageId": 3, "x": 1.5, "y": 2.0}))
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::CursorMove {
                page_id: 3,
                x: 1.5,
                y: 2.0
            }
        );
        let leave: ClientMessage = serde_json::from_value(json!({"type": "page:leave"})).unwrap();
        assert_eq!(leave, ClientMessage::PageLeave);
        assert!(serde_json::from_value::<ClientMessage>(json!({"type": "page:explode"})).is_err());
    }

    #[test]
    fn server_messages_serialize_camel_case() {
        let value = serde_json::to_value(ServerMessage::PageViewers {
            page_id: 9,
            viewers: vec![Viewer {
                user_id: 1,
                user_name: "Ada".to_string(),
                is_typing: true,
            }],
        })
        .unwrap();
        assert_eq!(
            value,
            json!({
                "type": "page:viewers",
                "pageId": 9,
                "viewers": [{"userId": 1, "userName": "Ada", "isTyping": true}]
            })
        );
        assert_eq!(serde_json::to_value(ServerMessage::Pong).unwrap(), json!({"type": "pong"}));
    }
}
