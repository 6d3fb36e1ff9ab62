//! Comment endpoints.
//!
//! Reading or adding a comment needs view access to whatever it hangs off.
//! Only the author may edit or archive it. Every user mentioned in a comment
//! (other than the author) gets a `mention` notification; on edit only the
//! newly added mentions are notified.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use rusqlite::Connection;
use serde::Deserialize;

use super::Success;
use crate::AppState;
use crate::access;
use crate::automation::AutomationEvent;
use crate::domain::{
    Comment, CommentParent, CommentUpdate, NewComment, NewNotification, NotificationType,
    TriggerKind,
};
use crate::error::{ApiError, ApiResult};
use crate::gateway::AuthenticatedUser;
use crate::store::{StoreResult, comments, notifications, users};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/comments", get(list_comments).post(create_comment))
        .route("/api/v1/comments/{id}", patch(update_comment))
        .route("/api/v1/comments/{id}/archive", post(archive_comment))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParentQuery {
    parent_type: CommentParent,
    parent_id: i64,
}

async fn list_comments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<ParentQuery>,
) -> ApiResult<Json<Vec<Comment>>> {
    let list = state
        .store
        .call(move |conn| {
            access::require_comment_parent(conn, user.id, query.parent_type, query.parent_id)?;
            Ok::<_, ApiError>(comments::list_comments(conn, query.parent_type, query.parent_id)?)
        })
        .await?;
    Ok(Json(list))
}

/// Sends mention notifications to `mentions` minus `already` and the author.
/// Unknown user ids are skipped. Returns how many were sent.
fn notify_mentions(
    conn: &Connection,
    comment: &Comment,
    author: &str,
    already: &[i64],
) -> StoreResult<usize> {
    let mut recipients: Vec<i64> = comment
        .mentions
        .iter()
        .copied()
        .filter(|id| *id != comment.created_by && !already.contains(id))
        .collect();
    recipients.sort_unstable();
    recipients.dedup();

    let mut sent = 0;
    for user_id in recipients {
        if users::get_user(conn, user_id)?.is_none() {
            tracing::debug!(user_id, comment_id = comment.id, "Skipping mention of unknown user");
            continue;
        }
        let notice = NewNotification::in_app(
            user_id,
            NotificationType::Mention,
            format!("{author} mentioned you in a comment"),
        )
        .with_content(comment.content.clone())
        .with_link(comment.parent_type.as_str(), comment.parent_id);
        notifications::create_notification(conn, &notice)?;
        sent += 1;
    }
    Ok(sent)
}

async fn create_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(input): Json<NewComment>,
) -> ApiResult<Json<Comment>> {
    let author = user.display_name();
    let (comment, workspace_id) = state
        .store
        .call(move |conn| {
            access::require_comment_parent(conn, user.id, input.parent_type, input.parent_id)?;
            let comment = comments::create_comment(conn, user.id, &input)?;
            notify_mentions(conn, &comment, &author, &[])?;
            let workspace_id = access::comment_workspace(conn, input.parent_type, input.parent_id)?;
            Ok::<_, ApiError>((comment, workspace_id))
        })
        .await?;

    if let Some(workspace_id) = workspace_id {
        state
            .automations
            .notify(AutomationEvent::new(
                TriggerKind::CommentAdded,
                workspace_id,
                user.id,
                "comment",
                &comment,
            ))
            .await;
    }
    Ok(Json(comment))
}

/// Live comment written by the caller.
fn own_comment(conn: &Connection, user_id: i64, id: i64) -> ApiResult<Comment> {
    let comment = comments::get_comment(conn, id)?
        .ok_or_else(|| ApiError::not_found(format!("comment {id} not found")))?;
    if comment.created_by != user_id {
        return Err(ApiError::forbidden("Only the author can change this comment"));
    }
    Ok(comment)
}

async fn update_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Json(update): Json<CommentUpdate>,
) -> ApiResult<Json<Comment>> {
    let author = user.display_name();
    let comment = state
        .store
        .call(move |conn| {
            let before = own_comment(conn, user.id, id)?;
            let comment = comments::update_comment(conn, id, &update)?;
            notify_mentions(conn, &comment, &author, &before.mentions)?;
            Ok::<_, ApiError>(comment)
        })
        .await?;
    Ok(Json(comment))
}

async fn archive_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Success>> {
    state
        .store
        .call(move |conn| {
            own_comment(conn, user.id, id)?;
            Ok::<_, ApiError>(comments::archive_comment(conn, id)?)
        })
        .await?;
    Ok(Json(Success::ok()))
}
