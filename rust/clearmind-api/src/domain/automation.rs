//! Automation records: a trigger, conditions over the event payload and
//! the actions to run when they all hold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

string_enum! {
    pub enum TriggerKind {
        PageCreated => "page_created",
        PageUpdated => "page_updated",
        TaskCompleted => "task_completed",
        DatabaseItemCreated => "database_item_created",
        TimelineEventCompleted => "timeline_event_completed",
        MoodLogged => "mood_logged",
        CommentAdded => "comment_added",
    }
}

string_enum! {
    pub enum ConditionOperator {
        Equals => "equals",
        NotEquals => "not_equals",
        Contains => "contains",
        GreaterThan => "greater_than",
        LessThan => "less_than",
    }
}

string_enum! {
    pub enum ActionKind {
        CreateNotification => "create_notification",
        CreateTimelineEvent => "create_timeline_event",
        CreateDatabaseItem => "create_database_item",
        SendEmail => "send_email",
        Webhook => "webhook",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dot path into the event payload, e.g. `page.title`.
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default)]
    pub config: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Automation {
    pub id: i64,
    pub workspace_id: i64,
    pub name: String,
    pub trigger: TriggerKind,
    pub conditions: Vec<Condition>,
    pub actions: Vec<ActionSpec>,
    pub enabled: bool,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAutomation {
    pub workspace_id: i64,
    pub name: String,
    pub trigger: TriggerKind,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub trigger: Option<TriggerKind>,
    #[serde(default)]
    pub conditions: Option<Vec<Condition>>,
    #[serde(default)]
    pub actions: Option<Vec<ActionSpec>>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn automation_payload_matches_client_shape() {
        let new: NewAutomation = serde_json::from_value(json!({
            "workspaceId": 1,
            "name": "Celebrate",
            "trigger": "task_completed",
            "conditions": [{"field": "event.title", "operator": "contains", "value": "gym"}],
            "actions": [{"type": "create_notification", "config": {"title": "Nice!"}}]
        }))
        .unwrap();
        assert!(new.enabled);
        assert_eq!(new.trigger, TriggerKind::TaskCompleted);
        assert_eq!(new.conditions[0].operator, ConditionOperator::Contains);
        assert_eq!(new.actions[0].kind, ActionKind::CreateNotification);
    }
}
