//! Core domain models.
//!
//! Wire format is camelCase JSON; enums serialize as the exact strings the
//! web client sends. Flexible payloads (block content, database schema,
//! view config, item properties) stay as [`serde_json::Value`].

use serde::{Deserialize, Deserializer};

/// A string did not name any variant of a closed enum.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a closed string enum that round-trips through serde and SQLite
/// as the given literal.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::domain::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::domain::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

pub mod automation;
pub mod collaboration;
pub mod content;
pub mod sync;
pub mod tables;
pub mod tracking;
pub mod users;

pub use automation::{
    ActionKind, ActionSpec, Automation, AutomationUpdate, Condition, ConditionOperator,
    NewAutomation, TriggerKind,
};
pub use collaboration::{
    Comment, CommentParent, CommentUpdate, DeliveryMethod, NewComment, NewNotification, NewShare,
    Notification, NotificationType, PageShare, SharePermission, ShareUpdate,
};
pub use content::{Block, BlockUpdate, NewBlock, NewPage, Page, PageNode, PageUpdate};
pub use sync::{SyncEntity, SyncMetadata};
pub use tables::{
    Database, DatabaseItem, DatabaseUpdate, DatabaseView, ItemUpdate, NewDatabase, NewItem,
    NewView, ViewType, ViewUpdate,
};
pub use tracking::{
    DailyMood, EventUpdate, MoodEntry, MoodSummary, NewEvent, NewMoodEntry, TimelineEvent,
};
pub use users::{
    NewWorkspace, NotificationSettings, QuietHours, Role, SensoryProfile, User, UserIdentity,
    Workspace,
};

/// Deserializes a field that distinguishes "absent" from "explicitly null".
///
/// Use with `#[serde(default, deserialize_with = "double_option")]` on an
/// `Option<Option<T>>`: absent leaves `None`, `null` yields `Some(None)`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
