//! User-defined databases: schema, views and rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::double_option;

string_enum! {
    /// Presentation of a database view.
    pub enum ViewType {
        Table => "table",
        Kanban => "kanban",
        Calendar => "calendar",
        Gallery => "gallery",
        List => "list",
        Timeline => "timeline",
    }
}

/// A structured collection; `schema` describes its properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    pub id: i64,
    pub workspace_id: i64,
    pub name: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub schema: Value,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDatabase {
    pub workspace_id: i64,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_object")]
    pub schema: Value,
}

pub(crate) fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseView {
    pub id: i64,
    pub database_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub view_type: ViewType,
    pub config: Value,
    pub position: i64,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewView {
    pub database_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub view_type: ViewType,
    #[serde(default = "empty_object")]
    pub config: Value,
    #[serde(default)]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub view_type: Option<ViewType>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub position: Option<i64>,
}

/// A row of a database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseItem {
    pub id: i64,
    pub database_id: i64,
    pub properties: Value,
    pub position: i64,
    pub archived: bool,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DatabaseItem {
    /// Display title: the `title` property, then `name`, else "Untitled".
    pub fn title(&self) -> String {
        ["title", "name"]
            .iter()
            .find_map(|key| match self.properties.get(*key) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| "Untitled".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub database_id: i64,
    #[serde(default = "empty_object")]
    pub properties: Value,
    #[serde(default)]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemUpdate {
    #[serde(default)]
    pub properties: Option<Value>,
    #[serde(default)]
    pub position: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(properties: Value) -> DatabaseItem {
        let now = Utc::now();
        DatabaseItem {
            id: 1,
            database_id: 1,
            properties,
            position: 0,
            archived: false,
            created_by: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn item_title_prefers_title_then_name() {
        assert_eq!(item(json!({"title": "Launch", "name": "x"})).title(), "Launch");
        assert_eq!(item(json!({"name": "Groceries"})).title(), "Groceries");
        assert_eq!(item(json!({"title": ""})).title(), "Untitled");
        assert_eq!(item(json!({})).title(), "Untitled");
    }
}
