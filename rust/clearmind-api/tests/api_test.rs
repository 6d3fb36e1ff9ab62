//! End-to-end tests for the HTTP API.
//!
//! Each test builds the full router (auth, rate limiting, timeouts) over an
//! in-memory store and drives it through `axum-test`.

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};

use clearmind_api::config::AppConfig;
use clearmind_api::domain::UserIdentity;
use clearmind_api::gateway::sign_login_assertion;
use clearmind_api::server::{build_router, build_state};

fn test_server() -> TestServer {
    let state = build_state(AppConfig::for_tests()).expect("Failed to build state");
    TestServer::new(build_router(state)).expect("Failed to start test server")
}

/// Identity assertion as the OAuth bridge would sign it.
fn assertion(open_id: &str, name: &str, secret: &str) -> String {
    let identity = UserIdentity {
        open_id: open_id.to_string(),
        name: Some(name.to_string()),
        email: None,
        login_method: Some("google".to_string()),
    };
    sign_login_assertion(&identity, secret, 300).expect("Failed to sign assertion")
}

/// Signs in and returns the session token with the user record.
async fn login(server: &TestServer, open_id: &str, name: &str) -> (String, Value) {
    let assertion = assertion(open_id, name, AppConfig::for_tests().login_secret());
    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "assertion": assertion }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let token = body["token"].as_str().expect("token missing").to_string();
    (token, body["user"].clone())
}

async fn default_workspace(server: &TestServer, token: &str) -> i64 {
    let response = server
        .get("/api/v1/workspaces/default")
        .authorization_bearer(token)
        .await;
    response.assert_status_ok();
    response.json::<Value>()["id"].as_i64().expect("workspace id")
}

async fn create_page(server: &TestServer, token: &str, workspace_id: i64, title: &str) -> Value {
    let response = server
        .post("/api/v1/pages")
        .authorization_bearer(token)
        .json(&json!({ "workspaceId": workspace_id, "title": title }))
        .await;
    response.assert_status_ok();
    response.json()
}

#[tokio::test]
async fn test_health_and_info_are_public() {
    let server = test_server();

    let health = server.get("/health").await;
    health.assert_status_ok();
    assert_eq!(health.json::<Value>()["status"], "ok");

    let ready = server.get("/ready").await;
    ready.assert_status_ok();
    let ready: Value = ready.json();
    assert_eq!(ready["status"], "ready");
    assert_eq!(ready["store"], true);

    let info: Value = server.get("/api/v1/info").await.json();
    assert_eq!(info["name"], "ClearMind");
    assert_eq!(info["realtimePath"], "/ws");
}

#[tokio::test]
async fn test_protected_routes_reject_missing_and_bad_tokens() {
    let server = test_server();

    let response = server.get("/api/v1/auth/me").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["message"], "Please login (10001)");

    let response = server
        .get("/api/v1/workspaces")
        .authorization_bearer("not-a-token")
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_creates_user_and_default_workspace() {
    let server = test_server();
    let (token, user) = login(&server, "oauth|alice", "Alice").await;
    assert_eq!(user["name"], "Alice");

    let me: Value = server
        .get("/api/v1/auth/me")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(me["openId"], "oauth|alice");

    let first = default_workspace(&server, &token).await;
    // Signing in again reuses the same workspace.
    let (token, _) = login(&server, "oauth|alice", "Alice").await;
    assert_eq!(default_workspace(&server, &token).await, first);

    let workspaces: Vec<Value> = server
        .get("/api/v1/workspaces")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(workspaces.len(), 1);
}

#[tokio::test]
async fn test_login_rejects_unverified_identities() {
    let server = test_server();
    let (alice, _) = login(&server, "oauth|alice", "Alice").await;

    let bare = server
        .post("/api/v1/auth/login")
        .json(&json!({ "openId": "oauth|alice", "name": "Mallory" }))
        .await;
    assert!(bare.status_code().is_client_error());

    let forged = server
        .post("/api/v1/auth/login")
        .json(&json!({
            "assertion": assertion("oauth|alice", "Mallory", "not-the-bridge-secret-at-all")
        }))
        .await;
    forged.assert_status(StatusCode::UNAUTHORIZED);
    assert!(forged.headers().get("set-cookie").is_none());

    let me: Value = server
        .get("/api/v1/auth/me")
        .authorization_bearer(&alice)
        .await
        .json();
    assert_eq!(me["name"], "Alice");
}

#[tokio::test]
async fn test_page_and_block_lifecycle() {
    let server = test_server();
    let (token, _) = login(&server, "oauth|alice", "Alice").await;
    let workspace_id = default_workspace(&server, &token).await;

    let parent = create_page(&server, &token, workspace_id, "Projects").await;
    let parent_id = parent["id"].as_i64().unwrap();
    assert_eq!(parent["parentId"], Value::Null);

    let child = server
        .post("/api/v1/pages")
        .authorization_bearer(&token)
        .json(&json!({ "workspaceId": workspace_id, "parentId": parent_id, "title": "Launch" }))
        .await;
    child.assert_status_ok();
    let child_id = child.json::<Value>()["id"].as_i64().unwrap();

    let hierarchy: Vec<Value> = server
        .get(&format!("/api/v1/workspaces/{workspace_id}/pages/hierarchy"))
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(hierarchy.len(), 1);
    assert_eq!(hierarchy[0]["title"], "Projects");
    assert_eq!(hierarchy[0]["children"][0]["id"], child_id);

    let renamed: Value = server
        .patch(&format!("/api/v1/pages/{child_id}"))
        .authorization_bearer(&token)
        .json(&json!({ "title": "Launch plan", "icon": "🚀" }))
        .await
        .json();
    assert_eq!(renamed["title"], "Launch plan");
    assert_eq!(renamed["icon"], "🚀");

    let mut block_ids = Vec::new();
    for text in ["first", "second", "third"] {
        let block = server
            .post("/api/v1/blocks")
            .authorization_bearer(&token)
            .json(&json!({ "pageId": child_id, "type": "paragraph", "content": { "text": text } }))
            .await;
        block.assert_status_ok();
        block_ids.push(block.json::<Value>()["id"].as_i64().unwrap());
    }

    let reversed: Vec<i64> = block_ids.iter().rev().copied().collect();
    let reordered: Vec<Value> = server
        .post(&format!("/api/v1/pages/{child_id}/blocks/reorder"))
        .authorization_bearer(&token)
        .json(&json!({ "blockIds": reversed }))
        .await
        .json();
    let order: Vec<i64> = reordered.iter().map(|b| b["id"].as_i64().unwrap()).collect();
    assert_eq!(order, reversed);

    server
        .delete(&format!("/api/v1/blocks/{}", block_ids[1]))
        .authorization_bearer(&token)
        .await
        .assert_status_ok();
    let blocks: Vec<Value> = server
        .get(&format!("/api/v1/pages/{child_id}/blocks"))
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(blocks.len(), 2);

    // Archiving hides the page until it is restored.
    server
        .post(&format!("/api/v1/pages/{child_id}/archive"))
        .authorization_bearer(&token)
        .await
        .assert_status_ok();
    server
        .get(&format!("/api/v1/pages/{child_id}"))
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let archived: Vec<Value> = server
        .get(&format!("/api/v1/workspaces/{workspace_id}/pages/archived"))
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(archived.len(), 1);

    let restored: Value = server
        .post(&format!("/api/v1/pages/{child_id}/unarchive"))
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(restored["archived"], false);
}

#[tokio::test]
async fn test_pages_are_private_to_their_workspace() {
    let server = test_server();
    let (alice, _) = login(&server, "oauth|alice", "Alice").await;
    let (bob, _) = login(&server, "oauth|bob", "Bob").await;
    let workspace_id = default_workspace(&server, &alice).await;
    let page_id = create_page(&server, &alice, workspace_id, "Diary").await["id"]
        .as_i64()
        .unwrap();

    server
        .get(&format!("/api/v1/pages/{page_id}"))
        .authorization_bearer(&bob)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .post("/api/v1/pages")
        .authorization_bearer(&bob)
        .json(&json!({ "workspaceId": workspace_id, "title": "Intruder" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_completing_a_task_runs_automation_once() {
    let server = test_server();
    let (token, _) = login(&server, "oauth|alice", "Alice").await;
    let workspace_id = default_workspace(&server, &token).await;

    let database: Value = server
        .post("/api/v1/databases")
        .authorization_bearer(&token)
        .json(&json!({
            "workspaceId": workspace_id,
            "name": "Tasks",
            "schema": { "title": { "type": "text" }, "status": { "type": "select" } }
        }))
        .await
        .json();
    let database_id = database["id"].as_i64().unwrap();

    let view = server
        .post("/api/v1/database-views")
        .authorization_bearer(&token)
        .json(&json!({ "databaseId": database_id, "name": "Board", "type": "kanban" }))
        .await;
    view.assert_status_ok();
    assert_eq!(view.json::<Value>()["type"], "kanban");

    server
        .post("/api/v1/automations")
        .authorization_bearer(&token)
        .json(&json!({
            "workspaceId": workspace_id,
            "name": "Celebrate",
            "trigger": "task_completed",
            "conditions": [{ "field": "item.properties.title", "operator": "contains", "value": "report" }],
            "actions": [{ "type": "create_notification", "config": { "title": "Nice work" } }]
        }))
        .await
        .assert_status_ok();

    let item: Value = server
        .post("/api/v1/database-items")
        .authorization_bearer(&token)
        .json(&json!({
            "databaseId": database_id,
            "properties": { "title": "Write report", "status": "todo" }
        }))
        .await
        .json();
    let item_id = item["id"].as_i64().unwrap();

    for _ in 0..2 {
        server
            .patch(&format!("/api/v1/database-items/{item_id}"))
            .authorization_bearer(&token)
            .json(&json!({ "properties": { "title": "Write report", "status": "done" } }))
            .await
            .assert_status_ok();
    }

    let unread: Vec<Value> = server
        .get("/api/v1/notifications/unread")
        .authorization_bearer(&token)
        .await
        .json();
    // The action's own notification plus the run summary.
    assert_eq!(unread.len(), 2);
    assert!(unread.iter().all(|n| n["type"] == "automation"));
    assert!(unread.iter().any(|n| n["title"] == "Nice work"));
    assert!(unread.iter().any(|n| n["title"] == "Automation \"Celebrate\" ran"));

    let cleared: Value = server
        .post("/api/v1/notifications/read-all")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(cleared["updated"], 2);
}

#[tokio::test]
async fn test_automation_dry_run_reports_planned_actions() {
    let server = test_server();
    let (token, _) = login(&server, "oauth|alice", "Alice").await;
    let workspace_id = default_workspace(&server, &token).await;

    let automation: Value = server
        .post("/api/v1/automations")
        .authorization_bearer(&token)
        .json(&json!({
            "workspaceId": workspace_id,
            "name": "Low mood check-in",
            "trigger": "mood_logged",
            "conditions": [{ "field": "mood.moodValue", "operator": "less_than", "value": 3 }],
            "actions": [{ "type": "create_notification", "config": { "title": "Take a break" } }]
        }))
        .await
        .json();
    let id = automation["id"].as_i64().unwrap();

    let report: Value = server
        .post(&format!("/api/v1/automations/{id}/test"))
        .authorization_bearer(&token)
        .json(&json!({ "payload": { "mood": { "moodValue": 2 } } }))
        .await
        .json();
    assert_eq!(report["matched"], true);
    assert_eq!(report["dryRun"], true);
    assert_eq!(report["actions"][0]["status"], "planned");

    // Dry runs never write notifications.
    let unread: Vec<Value> = server
        .get("/api/v1/notifications/unread")
        .authorization_bearer(&token)
        .await
        .json();
    assert!(unread.is_empty());
}

#[tokio::test]
async fn test_mood_entries_are_validated_and_summarized() {
    let server = test_server();
    let (token, _) = login(&server, "oauth|alice", "Alice").await;

    server
        .post("/api/v1/mood")
        .authorization_bearer(&token)
        .json(&json!({ "moodValue": 6 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    for value in [2, 4] {
        server
            .post("/api/v1/mood")
            .authorization_bearer(&token)
            .json(&json!({ "moodValue": value, "moodEmoji": "🙂" }))
            .await
            .assert_status_ok();
    }

    let recent: Vec<Value> = server
        .get("/api/v1/mood/recent")
        .authorization_bearer(&token)
        .add_query_param("limit", 1)
        .await
        .json();
    assert_eq!(recent.len(), 1);

    let summary: Value = server
        .get("/api/v1/mood/summary")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(summary["count"], 2);
    assert_eq!(summary["average"], 3.0);
}

#[tokio::test]
async fn test_timeline_lists_events_for_a_day() {
    let server = test_server();
    let (token, _) = login(&server, "oauth|alice", "Alice").await;

    let event: Value = server
        .post("/api/v1/timeline")
        .authorization_bearer(&token)
        .json(&json!({
            "title": "Standup",
            "startTime": "2026-03-02T09:30:00Z",
            "estimatedDuration": 15
        }))
        .await
        .json();
    let id = event["id"].as_i64().unwrap();

    let same_day: Vec<Value> = server
        .get("/api/v1/timeline")
        .authorization_bearer(&token)
        .add_query_param("date", "2026-03-02")
        .await
        .json();
    assert_eq!(same_day.len(), 1);

    let other_day: Vec<Value> = server
        .get("/api/v1/timeline")
        .authorization_bearer(&token)
        .add_query_param("date", "2026-03-03")
        .await
        .json();
    assert!(other_day.is_empty());

    let done: Value = server
        .patch(&format!("/api/v1/timeline/{id}"))
        .authorization_bearer(&token)
        .json(&json!({ "completed": true, "actualDuration": 20 }))
        .await
        .json();
    assert_eq!(done["completed"], true);
    assert!(done["completedAt"].is_string());
}

#[tokio::test]
async fn test_shares_and_mentions_notify_collaborators() {
    let server = test_server();
    let (alice, _) = login(&server, "oauth|alice", "Alice").await;
    let (bob, bob_user) = login(&server, "oauth|bob", "Bob").await;
    let bob_id = bob_user["id"].as_i64().unwrap();
    let workspace_id = default_workspace(&server, &alice).await;
    let page_id = create_page(&server, &alice, workspace_id, "Roadmap").await["id"]
        .as_i64()
        .unwrap();

    server
        .post(&format!("/api/v1/pages/{page_id}/shares"))
        .authorization_bearer(&alice)
        .json(&json!({ "userId": bob_id, "permission": "edit" }))
        .await
        .assert_status_ok();

    // Bob can now read and edit the page.
    server
        .get(&format!("/api/v1/pages/{page_id}"))
        .authorization_bearer(&bob)
        .await
        .assert_status_ok();
    server
        .patch(&format!("/api/v1/pages/{page_id}"))
        .authorization_bearer(&bob)
        .json(&json!({ "title": "Roadmap v2" }))
        .await
        .assert_status_ok();

    let comment: Value = server
        .post("/api/v1/comments")
        .authorization_bearer(&alice)
        .json(&json!({
            "parentType": "page",
            "parentId": page_id,
            "content": "@Bob can you review?",
            "mentions": [bob_id]
        }))
        .await
        .json();
    assert_eq!(comment["mentions"], json!([bob_id]));

    let unread: Vec<Value> = server
        .get("/api/v1/notifications/unread")
        .authorization_bearer(&bob)
        .await
        .json();
    let kinds: Vec<&str> = unread.iter().filter_map(|n| n["type"].as_str()).collect();
    assert!(kinds.contains(&"collaboration"));
    assert!(kinds.contains(&"mention"));

    // Only the author may edit a comment.
    server
        .patch(&format!("/api/v1/comments/{}", comment["id"]))
        .authorization_bearer(&bob)
        .json(&json!({ "content": "hijacked" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let comments: Vec<Value> = server
        .get("/api/v1/comments")
        .authorization_bearer(&bob)
        .add_query_param("parentType", "page")
        .add_query_param("parentId", page_id)
        .await
        .json();
    assert_eq!(comments.len(), 1);
}

#[tokio::test]
async fn test_public_share_link_checks_password() {
    let server = test_server();
    let (token, _) = login(&server, "oauth|alice", "Alice").await;
    let workspace_id = default_workspace(&server, &token).await;
    let page_id = create_page(&server, &token, workspace_id, "Recipes").await["id"]
        .as_i64()
        .unwrap();

    let share: Value = server
        .post(&format!("/api/v1/pages/{page_id}/shares"))
        .authorization_bearer(&token)
        .json(&json!({ "permission": "view", "password": "s3cret" }))
        .await
        .json();
    assert_eq!(share["passwordProtected"], true);
    assert!(share.get("passwordHash").is_none());
    let link = format!("/api/v1/shared/{}", share["shareToken"].as_str().unwrap());

    server.post(&link).await.assert_status(StatusCode::UNAUTHORIZED);
    server
        .post(&link)
        .json(&json!({ "password": "wrong" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let opened = server.post(&link).json(&json!({ "password": "s3cret" })).await;
    opened.assert_status_ok();
    let opened: Value = opened.json();
    assert_eq!(opened["page"]["title"], "Recipes");
    assert_eq!(opened["permission"], "view");

    server
        .post("/api/v1/shared/unknown-token")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_search_matches_pages_and_blocks() {
    let server = test_server();
    let (token, _) = login(&server, "oauth|alice", "Alice").await;
    let workspace_id = default_workspace(&server, &token).await;
    let page_id = create_page(&server, &token, workspace_id, "Garden plans").await["id"]
        .as_i64()
        .unwrap();
    server
        .post("/api/v1/blocks")
        .authorization_bearer(&token)
        .json(&json!({ "pageId": page_id, "type": "paragraph", "content": { "text": "Plant tomatoes in May" } }))
        .await
        .assert_status_ok();

    let results: Vec<Value> = server
        .get("/api/v1/search")
        .authorization_bearer(&token)
        .add_query_param("q", "garden")
        .await
        .json();
    assert_eq!(results[0]["type"], "page");
    assert_eq!(results[0]["id"], page_id);

    let results: Vec<Value> = server
        .get("/api/v1/search")
        .authorization_bearer(&token)
        .add_query_param("q", "tomatoes")
        .await
        .json();
    assert!(results.iter().any(|r| r["type"] == "block"));

    let empty: Vec<Value> = server
        .get("/api/v1/search")
        .authorization_bearer(&token)
        .add_query_param("q", "   ")
        .await
        .json();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_sync_push_detects_stale_writes() {
    let server = test_server();
    let (token, _) = login(&server, "oauth|alice", "Alice").await;
    let workspace_id = default_workspace(&server, &token).await;

    let created: Value = server
        .post("/api/v1/sync/push")
        .authorization_bearer(&token)
        .json(&json!({ "mutations": [{
            "clientId": "c1",
            "entityType": "page",
            "operation": "create",
            "payload": { "workspaceId": workspace_id, "title": "Offline note" }
        }] }))
        .await
        .json();
    let result = &created["results"][0];
    assert_eq!(result["status"], "applied");
    assert_eq!(result["version"], 1);
    let page_id = result["entityId"].as_i64().unwrap();

    let pushed: Value = server
        .post("/api/v1/sync/push")
        .authorization_bearer(&token)
        .json(&json!({ "mutations": [
            {
                "clientId": "c2",
                "entityType": "page",
                "entityId": page_id,
                "operation": "update",
                "payload": { "title": "Edited on laptop" },
                "baseVersion": 1
            },
            {
                "clientId": "c3",
                "entityType": "page",
                "entityId": page_id,
                "operation": "update",
                "payload": { "title": "Edited on phone" },
                "baseVersion": 1
            },
            {
                "clientId": "c4",
                "entityType": "block",
                "operation": "update",
                "payload": {}
            }
        ] }))
        .await
        .json();
    let results = pushed["results"].as_array().unwrap();
    assert_eq!(results[0]["status"], "applied");
    assert_eq!(results[0]["version"], 2);
    assert_eq!(results[1]["status"], "conflict");
    assert_eq!(results[1]["server"]["title"], "Edited on laptop");
    assert_eq!(results[2]["status"], "rejected");

    let changes: Vec<Value> = server
        .get("/api/v1/sync/changes")
        .authorization_bearer(&token)
        .add_query_param("since", "2000-01-01T00:00:00Z")
        .await
        .json();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["version"], 2);
}

#[tokio::test]
async fn test_templates_instantiate_pages_and_databases() {
    let server = test_server();
    let (token, _) = login(&server, "oauth|alice", "Alice").await;
    let workspace_id = default_workspace(&server, &token).await;

    let catalogue: Vec<Value> = server
        .get("/api/v1/templates/pages")
        .authorization_bearer(&token)
        .await
        .json();
    assert!(catalogue.iter().any(|t| t["id"] == "meeting-notes"));

    let page: Value = server
        .post("/api/v1/templates/pages/meeting-notes/instantiate")
        .authorization_bearer(&token)
        .json(&json!({ "workspaceId": workspace_id, "title": "Weekly sync" }))
        .await
        .json();
    assert_eq!(page["page"]["title"], "Weekly sync");
    assert!(!page["blocks"].as_array().unwrap().is_empty());

    let database = server
        .post("/api/v1/templates/databases/habit-tracker/instantiate")
        .authorization_bearer(&token)
        .json(&json!({ "workspaceId": workspace_id }))
        .await;
    database.assert_status_ok();

    server
        .post("/api/v1/templates/pages/no-such-template/instantiate")
        .authorization_bearer(&token)
        .json(&json!({ "workspaceId": workspace_id }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_assistant_endpoints_without_api_key() {
    let server = test_server();
    let (token, _) = login(&server, "oauth|alice", "Alice").await;

    server
        .post("/api/v1/ai/breakdown-task")
        .authorization_bearer(&token)
        .json(&json!({ "taskDescription": "Plan a move" }))
        .await
        .assert_status(StatusCode::BAD_GATEWAY);

    server
        .post("/api/v1/ai/improve-writing")
        .authorization_bearer(&token)
        .json(&json!({ "text": "   " }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

/// Chat completions stand-in that always answers with `content`.
async fn spawn_completions(status: StatusCode, content: &'static str) -> String {
    let app = axum::Router::new().route(
        "/v1/chat/completions",
        axum::routing::post(move || async move {
            (
                status,
                axum::Json(json!({"choices": [{"message": {"role": "assistant", "content": content}}]})),
            )
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Stub server error");
    });
    format!("http://{addr}")
}

fn server_with_assistant(base_url: String) -> TestServer {
    let mut config = AppConfig::for_tests();
    config.assistant.base_url = base_url;
    config.assistant.api_key = Some("sk-test".to_string());
    let state = build_state(config).expect("Failed to build state");
    TestServer::new(build_router(state)).expect("Failed to start test server")
}

#[tokio::test]
async fn test_assistant_endpoints_relay_the_upstream() {
    let base = spawn_completions(StatusCode::OK, r#"{"steps": [" Empty the shelves ", "Label boxes"]}"#).await;
    let server = server_with_assistant(base);
    let (token, _) = login(&server, "oauth|alice", "Alice").await;

    let response = server
        .post("/api/v1/ai/breakdown-task")
        .authorization_bearer(&token)
        .json(&json!({ "taskDescription": "Pack the study" }))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["subtasks"],
        json!(["Empty the shelves", "Label boxes"])
    );

    let base = spawn_completions(StatusCode::SERVICE_UNAVAILABLE, "").await;
    let server = server_with_assistant(base);
    let (token, _) = login(&server, "oauth|alice", "Alice").await;
    server
        .post("/api/v1/ai/improve-writing")
        .authorization_bearer(&token)
        .json(&json!({ "text": "make this better", "instruction": "shorter" }))
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}
