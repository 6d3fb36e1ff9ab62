//! Offline sync: replays queued client mutations and reports per-entity
//! versions.
//!
//! Each mutation runs in its own savepoint through the regular store
//! operations and access checks, so one bad mutation never aborts the
//! batch. When the client names a `baseVersion` older than the version the
//! server has recorded for that entity, the mutation is not applied and the
//! current server copy is returned instead.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::access;
use crate::automation::{self, AutomationEvent};
use crate::domain::{
    BlockUpdate, EventUpdate, ItemUpdate, NewBlock, NewEvent, NewItem, NewPage, PageUpdate,
    SharePermission, SyncEntity, SyncMetadata, TriggerKind,
};
use crate::error::{ApiError, ApiResult};
use crate::store::{self, databases, pages, timeline, users};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    pub client_id: String,
    pub entity_type: SyncEntity,
    #[serde(default)]
    pub entity_id: Option<i64>,
    pub operation: SyncOperation,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub base_version: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushRequest {
    pub mutations: Vec<Mutation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationStatus {
    Applied,
    Conflict,
    Rejected,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResult {
    pub client_id: String,
    pub status: MutationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Server copy of the entity, on conflict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<Value>,
}

impl MutationResult {
    fn rejected(client_id: String, entity_id: Option<i64>, error: impl Into<String>) -> Self {
        Self {
            client_id,
            status: MutationStatus::Rejected,
            entity_id,
            version: None,
            error: Some(error.into()),
            server: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    pub results: Vec<MutationResult>,
    pub synced_at: DateTime<Utc>,
}

/// Hex SHA-256 of the value's canonical JSON (object keys sorted).
pub fn content_hash(value: &Value) -> String {
    format!("{:x}", Sha256::digest(value.to_string().as_bytes()))
}

/// What a successful mutation produced.
struct Applied {
    entity_id: i64,
    event: Option<AutomationEvent>,
}

fn payload<T: DeserializeOwned>(value: &Value) -> ApiResult<T> {
    serde_json::from_value(value.clone()).map_err(|e| ApiError::bad_request(format!("invalid payload: {e}")))
}

fn require_id(mutation: &Mutation) -> ApiResult<i64> {
    mutation
        .entity_id
        .ok_or_else(|| ApiError::bad_request("entityId is required for update and delete"))
}

/// Turns an access refusal into "nothing to show".
fn visible<T>(checked: ApiResult<T>) -> ApiResult<Option<T>> {
    match checked {
        Ok(value) => Ok(Some(value)),
        Err(ApiError::Forbidden(_) | ApiError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Current server copy of an entity, if the caller can still see it.
fn load_entity(conn: &Connection, user_id: i64, entity: SyncEntity, id: i64) -> ApiResult<Option<Value>> {
    let value = match entity {
        SyncEntity::Page => visible(access::require_page(conn, user_id, id, SharePermission::View))?
            .map(serde_json::to_value),
        SyncEntity::Block => visible(access::require_block(conn, user_id, id, SharePermission::View))?
            .map(|(block, _)| serde_json::to_value(block)),
        SyncEntity::DatabaseItem => {
            visible(access::require_item(conn, user_id, id))?.map(|(item, _)| serde_json::to_value(item))
        }
        SyncEntity::TimelineEvent => {
            visible(access::require_event(conn, user_id, id))?.map(serde_json::to_value)
        }
    };
    value
        .transpose()
        .map_err(|e| ApiError::Internal(format!("failed to encode entity: {e}")))
}

fn apply(conn: &Connection, user_id: i64, mutation: &Mutation) -> ApiResult<Applied> {
    let body = &mutation.payload;
    match (mutation.entity_type, mutation.operation) {
        (SyncEntity::Page, SyncOperation::Create) => {
            let input: NewPage = payload(body)?;
            access::check_new_page(conn, user_id, &input)?;
            let page = pages::create_page(conn, user_id, &input)?;
            Ok(Applied {
                entity_id: page.id,
                event: Some(AutomationEvent::new(TriggerKind::PageCreated, page.workspace_id, user_id, "page", &page)),
            })
        }
        (SyncEntity::Page, SyncOperation::Update) => {
            let id = require_id(mutation)?;
            let update: PageUpdate = payload(body)?;
            access::check_page_update(conn, user_id, id, &update)?;
            let page = pages::update_page(conn, id, &update)?;
            Ok(Applied {
                entity_id: id,
                event: Some(AutomationEvent::new(
                    TriggerKind::PageUpdated,
                    page.workspace_id,
                    user_id,
                    "page",
                    &page,
                )),
            })
        }
        (SyncEntity::Page, SyncOperation::Delete) => {
            let id = require_id(mutation)?;
            access::require_page(conn, user_id, id, SharePermission::Admin)?;
            pages::archive_page(conn, id)?;
            Ok(Applied { entity_id: id, event: None })
        }
        (SyncEntity::Block, SyncOperation::Create) => {
            let input: NewBlock = payload(body)?;
            access::check_new_block(conn, user_id, &input)?;
            let block = pages::create_block(conn, user_id, &input)?;
            pages::touch_page(conn, block.page_id)?;
            Ok(Applied { entity_id: block.id, event: None })
        }
        (SyncEntity::Block, SyncOperation::Update) => {
            let id = require_id(mutation)?;
            let update: BlockUpdate = payload(body)?;
            access::check_block_update(conn, user_id, id, &update)?;
            let block = pages::update_block(conn, id, &update)?;
            pages::touch_page(conn, block.page_id)?;
            Ok(Applied { entity_id: id, event: None })
        }
        (SyncEntity::Block, SyncOperation::Delete) => {
            let id = require_id(mutation)?;
            access::require_block(conn, user_id, id, SharePermission::Edit)?;
            let block = pages::delete_block(conn, id)?;
            pages::touch_page(conn, block.page_id)?;
            Ok(Applied { entity_id: id, event: None })
        }
        (SyncEntity::DatabaseItem, SyncOperation::Create) => {
            let input: NewItem = payload(body)?;
            let database = access::require_database(conn, user_id, input.database_id)?;
            let item = databases::create_item(conn, user_id, &input)?;
            let event = AutomationEvent::new(
                TriggerKind::DatabaseItemCreated,
                database.workspace_id,
                user_id,
                "item",
                &item,
            );
            Ok(Applied { entity_id: item.id, event: Some(event) })
        }
        (SyncEntity::DatabaseItem, SyncOperation::Update) => {
            let id = require_id(mutation)?;
            let (before, database) = access::require_item(conn, user_id, id)?;
            let item = databases::update_item(conn, id, &payload::<ItemUpdate>(body)?)?;
            let event = automation::task_completed(&before.properties, &item.properties).then(|| {
                AutomationEvent::new(TriggerKind::TaskCompleted, database.workspace_id, user_id, "item", &item)
            });
            Ok(Applied { entity_id: id, event })
        }
        (SyncEntity::DatabaseItem, SyncOperation::Delete) => {
            let id = require_id(mutation)?;
            access::require_item(conn, user_id, id)?;
            databases::archive_item(conn, id)?;
            Ok(Applied { entity_id: id, event: None })
        }
        (SyncEntity::TimelineEvent, SyncOperation::Create) => {
            let input: NewEvent = payload(body)?;
            access::require_text("title", &input.title)?;
            let event = timeline::create_event(conn, user_id, &input)?;
            Ok(Applied { entity_id: event.id, event: None })
        }
        (SyncEntity::TimelineEvent, SyncOperation::Update) => {
            let id = require_id(mutation)?;
            let update: EventUpdate = payload(body)?;
            if let Some(title) = &update.title {
                access::require_text("title", title)?;
            }
            access::require_event(conn, user_id, id)?;
            let (event, completed) = timeline::update_event(conn, id, &update)?;
            let trigger = if completed {
                users::primary_workspace_id(conn, user_id)?.map(|workspace_id| {
                    AutomationEvent::new(TriggerKind::TimelineEventCompleted, workspace_id, user_id, "event", &event)
                })
            } else {
                None
            };
            Ok(Applied { entity_id: id, event: trigger })
        }
        (SyncEntity::TimelineEvent, SyncOperation::Delete) => {
            let id = require_id(mutation)?;
            access::require_event(conn, user_id, id)?;
            timeline::delete_event(conn, id)?;
            Ok(Applied { entity_id: id, event: None })
        }
    }
}

/// Applies one mutation inside a savepoint.
fn push_one(
    conn: &mut Connection,
    user_id: i64,
    mutation: &Mutation,
    events: &mut Vec<AutomationEvent>,
) -> ApiResult<MutationResult> {
    if let (Some(base), Some(id)) = (mutation.base_version, mutation.entity_id)
        && mutation.operation != SyncOperation::Create
        && let Some(meta) = store::sync::get_sync_metadata(conn, user_id, mutation.entity_type, id)?
        && base < meta.version
    {
        return Ok(MutationResult {
            client_id: mutation.client_id.clone(),
            status: MutationStatus::Conflict,
            entity_id: Some(id),
            version: Some(meta.version),
            error: Some(format!(
                "stale write: base version {base} is behind server version {}",
                meta.version
            )),
            server: load_entity(conn, user_id, mutation.entity_type, id)?,
        });
    }

    let savepoint = conn.savepoint().map_err(store::StoreError::from)?;
    // An early return drops the savepoint, which rolls the mutation back.
    let applied = apply(&savepoint, user_id, mutation)?;
    let hash = content_hash(&mutation.payload);
    let meta = store::sync::record_sync(
        &savepoint,
        user_id,
        mutation.entity_type,
        applied.entity_id,
        Some(&hash),
    )?;
    savepoint.commit().map_err(store::StoreError::from)?;

    events.extend(applied.event);
    Ok(MutationResult {
        client_id: mutation.client_id.clone(),
        status: MutationStatus::Applied,
        entity_id: Some(applied.entity_id),
        version: Some(meta.version),
        error: None,
        server: None,
    })
}

/// Replays a batch in order. Returns the per-mutation results and the
/// automation events the applied mutations raised.
pub fn push(
    conn: &mut Connection,
    user_id: i64,
    mutations: &[Mutation],
) -> (Vec<MutationResult>, Vec<AutomationEvent>) {
    let mut events = Vec::new();
    let results = mutations
        .iter()
        .map(|mutation| match push_one(conn, user_id, mutation, &mut events) {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(client_id = %mutation.client_id, error = %e, "Sync mutation rejected");
                MutationResult::rejected(mutation.client_id.clone(), mutation.entity_id, e.to_string())
            }
        })
        .collect();
    (results, events)
}

/// Sync metadata the user changed after `since`.
pub fn changes_since(conn: &Connection, user_id: i64, since: DateTime<Utc>) -> ApiResult<Vec<SyncMetadata>> {
    Ok(store::sync::list_sync_since(conn, user_id, since)?)
}
