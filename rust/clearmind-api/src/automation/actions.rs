//! Action execution.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use super::conditions::render_value;
use crate::domain::{
    ActionKind, ActionSpec, Automation, NewEvent, NewItem, NewNotification, NotificationType,
};
use crate::store::{StoreError, databases, notifications, timeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Executed,
    /// Would have run; dry runs only.
    Planned,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub status: ActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_id: Option<i64>,
}

impl ActionOutcome {
    fn new(kind: ActionKind, status: ActionStatus) -> Self {
        Self {
            kind,
            status,
            detail: None,
            created_id: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct NotificationConfig {
    title: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelineConfig {
    title: String,
    #[serde(default)]
    start_offset_minutes: i64,
    #[serde(default)]
    estimated_duration: Option<i64>,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemConfig {
    database_id: i64,
    #[serde(default)]
    properties: Option<Value>,
}

fn parse<T: DeserializeOwned>(config: Value) -> Result<T, String> {
    serde_json::from_value(config).map_err(|e| format!("invalid config: {e}"))
}

/// Runs (or, when `dry_run`, validates) one action. Failures are reported
/// in the outcome rather than returned.
pub(crate) fn execute(
    conn: &Connection,
    automation: &Automation,
    spec: &ActionSpec,
    payload: &Value,
    now: DateTime<Utc>,
    dry_run: bool,
) -> ActionOutcome {
    let config = render_value(&spec.config, payload, now);
    let result = match spec.kind {
        ActionKind::SendEmail | ActionKind::Webhook => {
            return ActionOutcome::new(spec.kind, ActionStatus::Skipped)
                .with_detail("outbound delivery is not available");
        }
        ActionKind::CreateNotification => {
            parse::<NotificationConfig>(config).and_then(|cfg| {
                if dry_run {
                    return Ok(None);
                }
                let mut input =
                    NewNotification::in_app(automation.created_by, NotificationType::Automation, cfg.title)
                        .with_link("automation", automation.id);
                input.content = cfg.content;
                notifications::create_notification(conn, &input)
                    .map(|n| Some(n.id))
                    .map_err(describe)
            })
        }
        ActionKind::CreateTimelineEvent => parse::<TimelineConfig>(config).and_then(|cfg| {
            if dry_run {
                return Ok(None);
            }
            let input = NewEvent {
                title: cfg.title,
                start_time: now + Duration::minutes(cfg.start_offset_minutes),
                database_item_id: None,
                estimated_duration: cfg.estimated_duration,
                color: cfg.color,
                icon: None,
            };
            timeline::create_event(conn, automation.created_by, &input)
                .map(|e| Some(e.id))
                .map_err(describe)
        }),
        ActionKind::CreateDatabaseItem => parse::<ItemConfig>(config).and_then(|cfg| {
            let database = databases::get_database(conn, cfg.database_id)
                .map_err(describe)?
                .filter(|db| db.workspace_id == automation.workspace_id)
                .ok_or_else(|| format!("database {} not found in workspace", cfg.database_id))?;
            if dry_run {
                return Ok(None);
            }
            let input = NewItem {
                database_id: database.id,
                properties: cfg.properties.unwrap_or_else(|| Value::Object(Default::default())),
                position: None,
            };
            databases::create_item(conn, automation.created_by, &input)
                .map(|item| Some(item.id))
                .map_err(describe)
        }),
    };

    match result {
        Ok(created_id) => {
            let status = if dry_run {
                ActionStatus::Planned
            } else {
                ActionStatus::Executed
            };
            ActionOutcome {
                created_id,
                ..ActionOutcome::new(spec.kind, status)
            }
        }
        Err(detail) => ActionOutcome::new(spec.kind, ActionStatus::Failed).with_detail(detail),
    }
}

fn describe(err: StoreError) -> String {
    err.to_string()
}
