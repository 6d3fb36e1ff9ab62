//! Offline sync bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    /// Entity kinds accepted from the client-side sync queue.
    pub enum SyncEntity {
        Page => "page",
        Block => "block",
        DatabaseItem => "databaseItem",
        TimelineEvent => "timelineEvent",
    }
}

/// Last synced version of one entity for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    pub id: i64,
    pub user_id: i64,
    pub entity_type: SyncEntity,
    pub entity_id: i64,
    pub last_synced_at: DateTime<Utc>,
    pub version: i64,
    pub content_hash: Option<String>,
}
