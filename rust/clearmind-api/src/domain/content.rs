//! Pages and the blocks they are made of.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::double_option;

/// A document in a workspace; pages nest through `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: i64,
    pub workspace_id: i64,
    pub parent_id: Option<i64>,
    pub title: String,
    pub icon: Option<String>,
    pub cover_image: Option<String>,
    pub position: i64,
    pub archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A page together with its visible descendants.
#[derive(Debug, Clone, Serialize)]
pub struct PageNode {
    #[serde(flatten)]
    pub page: Page,
    pub children: Vec<PageNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPage {
    pub workspace_id: i64,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default = "untitled")]
    pub title: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    /// Appended after the last sibling when omitted.
    #[serde(default)]
    pub position: Option<i64>,
}

fn untitled() -> String {
    "Untitled".to_string()
}

/// Partial page update. Nullable fields use `null` to clear.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub cover_image: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<i64>>,
    #[serde(default)]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: i64,
    pub page_id: i64,
    pub parent_block_id: Option<i64>,
    #[serde(rename = "type")]
    pub block_type: String,
    pub content: Value,
    pub position: i64,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Block {
    /// Plain text carried by the block, used for search snippets.
    pub fn text(&self) -> String {
        crate::search::extract_text(&self.content)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlock {
    pub page_id: i64,
    #[serde(default)]
    pub parent_block_id: Option<i64>,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockUpdate {
    #[serde(default, rename = "type")]
    pub block_type: Option<String>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_block_id: Option<Option<i64>>,
}
