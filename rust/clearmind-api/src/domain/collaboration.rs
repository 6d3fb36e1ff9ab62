//! Comments, notifications and page sharing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::double_option;

string_enum! {
    pub enum CommentParent {
        Page => "page",
        Block => "block",
        DatabaseItem => "databaseItem",
    }
}

string_enum! {
    pub enum NotificationType {
        Mention => "mention",
        Deadline => "deadline",
        Assignment => "assignment",
        Automation => "automation",
        Collaboration => "collaboration",
    }
}

string_enum! {
    pub enum DeliveryMethod {
        InApp => "inApp",
        Email => "email",
        Push => "push",
    }
}

string_enum! {
    /// Share permission, ordered from weakest to strongest.
    pub enum SharePermission {
        View => "view",
        Edit => "edit",
        Admin => "admin",
    }
}

impl SharePermission {
    fn rank(self) -> u8 {
        match self {
            Self::View => 0,
            Self::Edit => 1,
            Self::Admin => 2,
        }
    }

    /// Whether this permission grants at least `required`.
    pub fn allows(self, required: SharePermission) -> bool {
        self.rank() >= required.rank()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub parent_type: CommentParent,
    pub parent_id: i64,
    pub content: String,
    /// Mentioned user ids.
    pub mentions: Vec<i64>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub parent_type: CommentParent,
    pub parent_id: i64,
    pub content: String,
    #[serde(default)]
    pub mentions: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentUpdate {
    pub content: String,
    #[serde(default)]
    pub mentions: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub content: Option<String>,
    pub link_type: Option<String>,
    pub link_id: Option<i64>,
    pub read: bool,
    pub delivered: bool,
    pub delivery_method: DeliveryMethod,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub notification_type: NotificationType,
    pub title: String,
    pub content: Option<String>,
    pub link_type: Option<String>,
    pub link_id: Option<i64>,
    pub delivery_method: DeliveryMethod,
}

impl NewNotification {
    /// In-app notification without a link.
    pub fn in_app(user_id: i64, notification_type: NotificationType, title: impl Into<String>) -> Self {
        Self {
            user_id,
            notification_type,
            title: title.into(),
            content: None,
            link_type: None,
            link_id: None,
            delivery_method: DeliveryMethod::InApp,
        }
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    #[must_use]
    pub fn with_link(mut self, link_type: impl Into<String>, link_id: i64) -> Self {
        self.link_type = Some(link_type.into());
        self.link_id = Some(link_id);
        self
    }
}

/// Access grant on a page: to one user, or a public link when `user_id`
/// is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageShare {
    pub id: i64,
    pub page_id: i64,
    pub user_id: Option<i64>,
    pub permission: SharePermission,
    pub share_token: Option<String>,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub password_protected: bool,
    pub enabled: bool,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewShare {
    #[serde(default)]
    pub user_id: Option<i64>,
    pub permission: SharePermission,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareUpdate {
    #[serde(default)]
    pub permission: Option<SharePermission>,
    #[serde(default)]
    pub enabled: Option<bool>,
    /// `null` removes the password.
    #[serde(default, deserialize_with = "double_option")]
    pub password: Option<Option<String>>,
}
