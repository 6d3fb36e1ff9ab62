//! Automation engine.
//!
//! Handlers hand an [`AutomationEvent`] to the engine once the triggering
//! write has been committed. Every enabled automation of the workspace
//! listening on that trigger is evaluated: all conditions must hold for its
//! actions to run. Failures are logged and never propagate to the caller.
//!
//! Event payloads carry the affected record under a trigger-specific key
//! (`page`, `item`, `event`, `mood`, `comment`) plus `user` and `trigger`,
//! so conditions read like `page.title` or `mood.moodValue`.

pub mod actions;
pub mod conditions;

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Value, json};

pub use actions::{ActionOutcome, ActionStatus};

use crate::domain::{Automation, NewNotification, NotificationType, TriggerKind};
use crate::logging::OpTimer;
use crate::store::{Store, StoreResult, automations, notifications};

/// Something happened that automations may react to.
#[derive(Debug, Clone)]
pub struct AutomationEvent {
    pub trigger: TriggerKind,
    pub workspace_id: i64,
    pub user_id: i64,
    pub payload: Value,
}

impl AutomationEvent {
    /// Builds an event whose payload holds `record` under `key`.
    pub fn new<T: Serialize>(
        trigger: TriggerKind,
        workspace_id: i64,
        user_id: i64,
        key: &str,
        record: &T,
    ) -> Self {
        let record = serde_json::to_value(record).unwrap_or(Value::Null);
        Self {
            trigger,
            workspace_id,
            user_id,
            payload: json!({
                key: record,
                "user": { "id": user_id },
                "trigger": trigger.as_str(),
            }),
        }
    }
}

/// Whether item properties describe a finished task: a `status` of
/// done/completed, or `completed: true`.
pub fn is_task_done(properties: &Value) -> bool {
    let status_done = properties
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|s| s.eq_ignore_ascii_case("done") || s.eq_ignore_ascii_case("completed"));
    status_done || properties.get("completed").and_then(Value::as_bool) == Some(true)
}

/// True when an item update moved it from open to done.
pub fn task_completed(before: &Value, after: &Value) -> bool {
    !is_task_done(before) && is_task_done(after)
}

/// Result of evaluating one automation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationReport {
    pub automation_id: i64,
    pub name: String,
    pub trigger: TriggerKind,
    pub matched: bool,
    pub dry_run: bool,
    pub actions: Vec<ActionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<i64>,
}

impl AutomationReport {
    pub fn executed(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| a.status == ActionStatus::Executed)
            .count()
    }
}

/// Evaluates one automation against a payload, running its actions when it
/// matches.
pub fn run_automation(
    conn: &Connection,
    automation: &Automation,
    payload: &Value,
    dry_run: bool,
) -> StoreResult<AutomationReport> {
    let matched = conditions::evaluate_all(&automation.conditions, payload);
    let mut report = AutomationReport {
        automation_id: automation.id,
        name: automation.name.clone(),
        trigger: automation.trigger,
        matched,
        dry_run,
        actions: Vec::new(),
        notification_id: None,
    };
    if !matched {
        return Ok(report);
    }

    let now = Utc::now();
    report.actions = automation
        .actions
        .iter()
        .map(|spec| actions::execute(conn, automation, spec, payload, now, dry_run))
        .collect();

    for failed in report.actions.iter().filter(|a| a.status == ActionStatus::Failed) {
        tracing::warn!(
            automation_id = automation.id,
            action = %failed.kind,
            detail = failed.detail.as_deref().unwrap_or_default(),
            "Automation action failed"
        );
    }

    let executed = report.executed();
    if !dry_run && executed > 0 {
        let notice = NewNotification::in_app(
            automation.created_by,
            NotificationType::Automation,
            format!("Automation \"{}\" ran", automation.name),
        )
        .with_content(format!("{executed} action(s) completed"))
        .with_link("automation", automation.id);
        report.notification_id = Some(notifications::create_notification(conn, &notice)?.id);
    }

    Ok(report)
}

/// Runs every enabled automation listening for `event`.
pub fn dispatch_sync(conn: &Connection, event: &AutomationEvent) -> StoreResult<Vec<AutomationReport>> {
    automations::list_enabled_by_trigger(conn, event.workspace_id, event.trigger)?
        .iter()
        .map(|automation| run_automation(conn, automation, &event.payload, false))
        .collect()
}

/// Async front end over the store.
#[derive(Debug, Clone)]
pub struct AutomationEngine {
    store: Store,
}

impl AutomationEngine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Runs matching automations and returns their reports.
    pub async fn dispatch(&self, event: AutomationEvent) -> StoreResult<Vec<AutomationReport>> {
        let timer = OpTimer::new("automation", "dispatch");
        let trigger = event.trigger;
        let result = self.store.call(move |conn| dispatch_sync(conn, &event)).await;
        if let Ok(reports) = &result
            && !reports.is_empty()
        {
            tracing::info!(
                trigger = %trigger,
                evaluated = reports.len(),
                matched = reports.iter().filter(|r| r.matched).count(),
                "Automations evaluated"
            );
        }
        timer.finish_with_result(result.as_ref());
        result
    }

    /// Like [`Self::dispatch`], but only logs failures.
    pub async fn notify(&self, event: AutomationEvent) {
        let trigger = event.trigger;
        if let Err(e) = self.dispatch(event).await {
            tracing::warn!(trigger = %trigger, error = %e, "Automation dispatch failed");
        }
    }

    /// Evaluates `automation` against a sample payload without writing.
    pub async fn test(&self, automation: Automation, payload: Value) -> StoreResult<AutomationReport> {
        self.store
            .call(move |conn| run_automation(conn, &automation, &payload, true))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ActionKind, ActionSpec, Condition, ConditionOperator, NewAutomation, NewDatabase,
    };
    use crate::store::{databases, test_support, timeline};

    fn automation(conn: &Connection, user_id: i64, input: &NewAutomation) -> Automation {
        automations::create_automation(conn, user_id, input).unwrap()
    }

    fn new_automation(workspace_id: i64, trigger: TriggerKind) -> NewAutomation {
        NewAutomation {
            workspace_id,
            name: "Low mood check-in".to_string(),
            trigger,
            conditions: vec![Condition {
                field: "mood.moodValue".to_string(),
                operator: ConditionOperator::LessThan,
                value: json!(3),
            }],
            actions: vec![
                ActionSpec {
                    kind: ActionKind::CreateNotification,
                    config: json!({"title": "Mood was {{mood.moodValue}}", "content": "Take a break"}),
                },
                ActionSpec {
                    kind: ActionKind::CreateTimelineEvent,
                    config: json!({"title": "Walk", "startOffsetMinutes": 30, "estimatedDuration": 15}),
                },
                ActionSpec {
                    kind: ActionKind::Webhook,
                    config: json!({"url": "https://example.invalid"}),
                },
            ],
            enabled: true,
        }
    }

    #[test]
    fn task_completion_needs_a_transition() {
        assert!(task_completed(&json!({"status": "Todo"}), &json!({"status": "Done"})));
        assert!(task_completed(&json!({}), &json!({"completed": true})));
        assert!(task_completed(&json!({"status": "doing"}), &json!({"status": "completed"})));
        assert!(!task_completed(&json!({"status": "done"}), &json!({"status": "done"})));
        assert!(!task_completed(&json!({"completed": false}), &json!({"completed": "yes"})));
    }

    #[test]
    fn matching_automation_runs_actions_and_notifies() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u1");
        let ws = test_support::workspace(&conn, &user);
        automation(&conn, user.id, &new_automation(ws.id, TriggerKind::MoodLogged));

        let event = AutomationEvent::new(
            TriggerKind::MoodLogged,
            ws.id,
            user.id,
            "mood",
            &json!({"moodValue": 2}),
        );
        let reports = dispatch_sync(&conn, &event).unwrap();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert!(report.matched);
        assert_eq!(report.executed(), 2);
        assert_eq!(report.actions[2].status, ActionStatus::Skipped);
        assert!(report.notification_id.is_some());

        let unread = notifications::list_unread(&conn, user.id).unwrap();
        assert_eq!(unread.len(), 2);
        assert!(unread.iter().any(|n| n.title == "Mood was 2"));
        assert!(unread.iter().any(|n| n.title == "Automation \"Low mood check-in\" ran"));

        let event_id = report.actions[1].created_id.unwrap();
        let walk = timeline::get_event(&conn, event_id).unwrap().unwrap();
        assert_eq!(walk.estimated_duration, Some(15));
        assert!(walk.start_time > Utc::now());
    }

    #[test]
    fn unmatched_or_other_trigger_does_nothing() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u1");
        let ws = test_support::workspace(&conn, &user);
        automation(&conn, user.id, &new_automation(ws.id, TriggerKind::MoodLogged));

        let happy = AutomationEvent::new(TriggerKind::MoodLogged, ws.id, user.id, "mood", &json!({"moodValue": 5}));
        let reports = dispatch_sync(&conn, &happy).unwrap();
        assert!(!reports[0].matched);
        assert!(reports[0].actions.is_empty());

        let other = AutomationEvent::new(TriggerKind::PageCreated, ws.id, user.id, "page", &json!({}));
        assert!(dispatch_sync(&conn, &other).unwrap().is_empty());
        assert!(notifications::list_unread(&conn, user.id).unwrap().is_empty());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u1");
        let ws = test_support::workspace(&conn, &user);
        let auto = automation(&conn, user.id, &new_automation(ws.id, TriggerKind::MoodLogged));

        let report = run_automation(&conn, &auto, &json!({"mood": {"moodValue": 1}}), true).unwrap();
        assert!(report.matched && report.dry_run);
        assert_eq!(report.actions[0].status, ActionStatus::Planned);
        assert_eq!(report.actions[1].status, ActionStatus::Planned);
        assert!(report.notification_id.is_none());
        assert!(notifications::list_unread(&conn, user.id).unwrap().is_empty());
    }

    #[test]
    fn database_item_action_stays_inside_the_workspace() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u1");
        let ws = test_support::workspace(&conn, &user);
        let other_ws = test_support::workspace(&conn, &user);
        let inbox = databases::create_database(
            &conn,
            user.id,
            &NewDatabase {
                workspace_id: ws.id,
                name: "Inbox".to_string(),
                icon: None,
                description: None,
                schema: json!({}),
            },
        )
        .unwrap();

        let mut input = new_automation(other_ws.id, TriggerKind::PageCreated);
        input.conditions.clear();
        input.actions = vec![ActionSpec {
            kind: ActionKind::CreateDatabaseItem,
            config: json!({"databaseId": inbox.id, "properties": {"title": "Review {{page.title}}"}}),
        }];
        let foreign = automation(&conn, user.id, &input);
        let report = run_automation(&conn, &foreign, &json!({"page": {"title": "Plan"}}), false).unwrap();
        assert_eq!(report.actions[0].status, ActionStatus::Failed);

        input.workspace_id = ws.id;
        let local = automation(&conn, user.id, &input);
        let report = run_automation(&conn, &local, &json!({"page": {"title": "Plan"}}), false).unwrap();
        assert_eq!(report.actions[0].status, ActionStatus::Executed);
        let items = databases::list_items(&conn, inbox.id).unwrap();
        assert_eq!(items[0].properties["title"], "Review Plan");
    }
}
