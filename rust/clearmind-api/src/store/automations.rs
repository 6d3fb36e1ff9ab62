//! Automation rules.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{StoreError, StoreResult, json_column, to_json_text};
use crate::domain::{Automation, AutomationUpdate, NewAutomation, TriggerKind};

const AUTOMATION_COLUMNS: &str = "id, workspace_id, name, trigger_type, conditions, actions, \
     enabled, created_by, created_at, updated_at";

fn automation_from_row(row: &Row<'_>) -> rusqlite::Result<Automation> {
    Ok(Automation {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        name: row.get(2)?,
        trigger: row.get(3)?,
        conditions: json_column(row, 4)?,
        actions: json_column(row, 5)?,
        enabled: row.get(6)?,
        created_by: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn query(conn: &Connection, filter: &str, params: impl rusqlite::Params) -> StoreResult<Vec<Automation>> {
    let sql = format!("SELECT {AUTOMATION_COLUMNS} FROM automations WHERE {filter}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params, automation_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn create_automation(
    conn: &Connection,
    user_id: i64,
    input: &NewAutomation,
) -> StoreResult<Automation> {
    if input.name.trim().is_empty() {
        return Err(StoreError::invalid("name", "must not be empty"));
    }
    let now = Utc::now();
    conn.execute(
        "INSERT INTO automations (workspace_id, name, trigger_type, conditions, actions, enabled,
                                  created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            input.workspace_id,
            input.name,
            input.trigger,
            to_json_text(&input.conditions)?,
            to_json_text(&input.actions)?,
            input.enabled,
            user_id,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_automation(conn, id)?.ok_or(StoreError::not_found("automation", id))
}

pub fn get_automation(conn: &Connection, id: i64) -> StoreResult<Option<Automation>> {
    let sql = format!("SELECT {AUTOMATION_COLUMNS} FROM automations WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], automation_from_row).optional()?)
}

/// Automations created by the user, newest first.
pub fn list_automations_by_user(conn: &Connection, user_id: i64) -> StoreResult<Vec<Automation>> {
    query(conn, "created_by = ?1 ORDER BY created_at DESC, id DESC", [user_id])
}

/// Enabled automations in a workspace listening for `trigger`.
pub fn list_enabled_by_trigger(
    conn: &Connection,
    workspace_id: i64,
    trigger: TriggerKind,
) -> StoreResult<Vec<Automation>> {
    query(
        conn,
        "workspace_id = ?1 AND trigger_type = ?2 AND enabled = 1 ORDER BY id ASC",
        params![workspace_id, trigger],
    )
}

pub fn update_automation(
    conn: &Connection,
    id: i64,
    update: &AutomationUpdate,
) -> StoreResult<Automation> {
    let mut automation =
        get_automation(conn, id)?.ok_or(StoreError::not_found("automation", id))?;

    if let Some(name) = &update.name {
        automation.name.clone_from(name);
    }
    if let Some(trigger) = update.trigger {
        automation.trigger = trigger;
    }
    if let Some(conditions) = &update.conditions {
        automation.conditions.clone_from(conditions);
    }
    if let Some(actions) = &update.actions {
        automation.actions.clone_from(actions);
    }
    if let Some(enabled) = update.enabled {
        automation.enabled = enabled;
    }
    automation.updated_at = Utc::now();

    conn.execute(
        "UPDATE automations SET name = ?1, trigger_type = ?2, conditions = ?3, actions = ?4,
                                enabled = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            automation.name,
            automation.trigger,
            to_json_text(&automation.conditions)?,
            to_json_text(&automation.actions)?,
            automation.enabled,
            automation.updated_at,
            id,
        ],
    )?;
    Ok(automation)
}

pub fn delete_automation(conn: &Connection, id: i64) -> StoreResult<()> {
    let changed = conn.execute("DELETE FROM automations WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(StoreError::not_found("automation", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActionKind, ActionSpec, Condition, ConditionOperator};
    use crate::store::test_support;
    use serde_json::json;

    fn new_automation(workspace_id: i64, name: &str, trigger: TriggerKind) -> NewAutomation {
        NewAutomation {
            workspace_id,
            name: name.to_string(),
            trigger,
            conditions: vec![Condition {
                field: "page.title".to_string(),
                operator: ConditionOperator::Contains,
                value: json!("plan"),
            }],
            actions: vec![ActionSpec {
                kind: ActionKind::CreateNotification,
                config: json!({"title": "New plan"}),
            }],
            enabled: true,
        }
    }

    #[test]
    fn trigger_lookup_skips_disabled_rules() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u");
        let ws = test_support::workspace(&conn, &user);

        let on_page = create_automation(
            &conn,
            user.id,
            &new_automation(ws.id, "Pages", TriggerKind::PageCreated),
        )
        .unwrap();
        create_automation(
            &conn,
            user.id,
            &new_automation(ws.id, "Moods", TriggerKind::MoodLogged),
        )
        .unwrap();

        let hits = list_enabled_by_trigger(&conn, ws.id, TriggerKind::PageCreated).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].conditions[0].operator, ConditionOperator::Contains);

        update_automation(
            &conn,
            on_page.id,
            &AutomationUpdate {
                enabled: Some(false),
                ..AutomationUpdate::default()
            },
        )
        .unwrap();
        assert!(list_enabled_by_trigger(&conn, ws.id, TriggerKind::PageCreated)
            .unwrap()
            .is_empty());
        assert_eq!(list_automations_by_user(&conn, user.id).unwrap().len(), 2);
    }

    #[test]
    fn delete_removes_the_rule() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u");
        let ws = test_support::workspace(&conn, &user);
        let rule = create_automation(
            &conn,
            user.id,
            &new_automation(ws.id, "Pages", TriggerKind::PageCreated),
        )
        .unwrap();
        delete_automation(&conn, rule.id).unwrap();
        assert!(get_automation(&conn, rule.id).unwrap().is_none());
        assert!(delete_automation(&conn, rule.id).is_err());
    }
}
