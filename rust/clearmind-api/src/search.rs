//! Global search across pages, blocks, databases, items, timeline events
//! and page comments.
//!
//! Each source runs its own `LIKE` query capped at `limit`; hits are scored
//! with a small point system and merged:
//!
//! | signal                            | points |
//! |-----------------------------------|--------|
//! | title equals query                | 100    |
//! | title starts with query           | 50     |
//! | title contains query              | 25     |
//! | content contains query            | +10    |
//! | each query word in title/content  | +5     |
//!
//! Title points are exclusive (best one wins); the rest accumulate.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;
use serde_json::Value;

use crate::store::{StoreResult, like_pattern};

const PAGE_ICON: &str = "📄";
const DATABASE_ICON: &str = "🗂️";
const EVENT_ICON: &str = "📅";
const COMMENT_ICON: &str = "💬";

/// Snippet length when the query is not found in the content.
const SNIPPET_LEN: usize = 150;
const SNIPPET_BEFORE: usize = 50;
const SNIPPET_AFTER: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultKind {
    Page,
    Block,
    Database,
    DatabaseItem,
    TimelineEvent,
    Comment,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ResultKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub icon: String,
    pub url: String,
    pub updated_at: DateTime<Utc>,
    pub relevance: u32,
}

/// Plain text of a block's JSON content: `content.text`, the string itself,
/// or the JSON text as a last resort.
pub fn extract_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Object(map) => match map.get("text") {
            Some(Value::String(text)) if !text.is_empty() => text.clone(),
            _ => content.to_string(),
        },
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Scores a hit. `query` is expected trimmed.
pub fn relevance(query: &str, title: &str, content: &str) -> u32 {
    let query = query.to_lowercase();
    let title = title.to_lowercase();
    let content = content.to_lowercase();

    let mut score = if title == query {
        100
    } else if title.starts_with(&query) {
        50
    } else if title.contains(&query) {
        25
    } else {
        0
    };

    if content.contains(&query) {
        score += 10;
    }

    let matching = query
        .split_whitespace()
        .filter(|word| title.contains(word) || content.contains(word))
        .count();
    score + 5 * u32::try_from(matching).unwrap_or(u32::MAX / 5)
}

/// Preview of `content` around the first hit of `query`.
pub fn snippet(content: &str, query: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    let lowered: Vec<char> = content.to_lowercase().chars().collect();
    let needle: Vec<char> = query.to_lowercase().chars().collect();

    // Lowercasing can change length for a few scripts; fall back to a plain
    // prefix then.
    let hit = if lowered.len() == chars.len() && !needle.is_empty() {
        lowered
            .windows(needle.len())
            .position(|window| window == needle.as_slice())
    } else {
        None
    };

    let Some(index) = hit else {
        let mut out: String = chars.iter().take(SNIPPET_LEN).collect();
        if chars.len() > SNIPPET_LEN {
            out.push_str("...");
        }
        return out;
    };

    let start = index.saturating_sub(SNIPPET_BEFORE);
    let end = (index + needle.len() + SNIPPET_AFTER).min(chars.len());
    let mut out = String::new();
    if start > 0 {
        out.push_str("...");
    }
    out.extend(&chars[start..end]);
    if end < chars.len() {
        out.push_str("...");
    }
    out
}

/// Runs the search for `user_id` within one workspace.
pub fn global_search(
    conn: &Connection,
    query: &str,
    workspace_id: i64,
    user_id: i64,
    limit: usize,
) -> StoreResult<Vec<SearchResult>> {
    let query = query.trim();
    if query.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }
    let pattern = like_pattern(query);
    let cap = i64::try_from(limit).unwrap_or(i64::MAX);

    let mut results = Vec::new();
    search_pages(conn, query, &pattern, workspace_id, cap, &mut results)?;
    search_blocks(conn, query, &pattern, workspace_id, cap, &mut results)?;
    search_databases(conn, query, &pattern, workspace_id, cap, &mut results)?;
    search_items(conn, query, &pattern, workspace_id, cap, &mut results)?;
    search_events(conn, query, &pattern, user_id, cap, &mut results)?;
    search_comments(conn, query, &pattern, workspace_id, cap, &mut results)?;

    results.sort_by(|a, b| {
        b.relevance
            .cmp(&a.relevance)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
    });
    results.truncate(limit);
    Ok(results)
}

fn search_pages(
    conn: &Connection,
    query: &str,
    pattern: &str,
    workspace_id: i64,
    cap: i64,
    out: &mut Vec<SearchResult>,
) -> StoreResult<()> {
    let mut stmt = conn.prepare(
        "SELECT id, title, icon, updated_at FROM pages
         WHERE workspace_id = ?1 AND archived = 0 AND title LIKE ?2 ESCAPE '\\'
         LIMIT ?3",
    )?;
    let rows = stmt.query_map(params![workspace_id, pattern, cap], |row| {
        let id: i64 = row.get(0)?;
        let title: String = row.get(1)?;
        let icon: Option<String> = row.get(2)?;
        Ok(SearchResult {
            id,
            kind: ResultKind::Page,
            relevance: relevance(query, &title, ""),
            title,
            content: None,
            icon: icon.unwrap_or_else(|| PAGE_ICON.to_string()),
            url: format!("/pages/{id}"),
            updated_at: row.get(3)?,
        })
    })?;
    for row in rows {
        out.push(row?);
    }
    Ok(())
}

fn search_blocks(
    conn: &Connection,
    query: &str,
    pattern: &str,
    workspace_id: i64,
    cap: i64,
    out: &mut Vec<SearchResult>,
) -> StoreResult<()> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.content, b.updated_at, p.id, p.title, p.icon
         FROM blocks b JOIN pages p ON p.id = b.page_id
         WHERE p.workspace_id = ?1 AND p.archived = 0 AND b.content LIKE ?2 ESCAPE '\\'
         LIMIT ?3",
    )?;
    let rows = stmt.query_map(params![workspace_id, pattern, cap], |row| {
        let raw: String = row.get(1)?;
        let text = serde_json::from_str::<Value>(&raw).map_or(raw, |value| extract_text(&value));
        let page_id: i64 = row.get(3)?;
        let page_title: String = row.get(4)?;
        let icon: Option<String> = row.get(5)?;
        Ok(SearchResult {
            id: row.get(0)?,
            kind: ResultKind::Block,
            relevance: relevance(query, &page_title, &text),
            content: Some(snippet(&text, query)),
            title: page_title,
            icon: icon.unwrap_or_else(|| PAGE_ICON.to_string()),
            url: format!("/pages/{page_id}"),
            updated_at: row.get(2)?,
        })
    })?;
    for row in rows {
        out.push(row?);
    }
    Ok(())
}

fn search_databases(
    conn: &Connection,
    query: &str,
    pattern: &str,
    workspace_id: i64,
    cap: i64,
    out: &mut Vec<SearchResult>,
) -> StoreResult<()> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, icon, updated_at FROM databases
         WHERE workspace_id = ?1
           AND (name LIKE ?2 ESCAPE '\\' OR description LIKE ?2 ESCAPE '\\')
         LIMIT ?3",
    )?;
    let rows = stmt.query_map(params![workspace_id, pattern, cap], |row| {
        let id: i64 = row.get(0)?;
        let name: String = row.get(1)?;
        let description: Option<String> = row.get(2)?;
        let icon: Option<String> = row.get(3)?;
        Ok(SearchResult {
            id,
            kind: ResultKind::Database,
            relevance: relevance(query, &name, description.as_deref().unwrap_or_default()),
            title: name,
            content: description,
            icon: icon.unwrap_or_else(|| DATABASE_ICON.to_string()),
            url: format!("/databases/{id}"),
            updated_at: row.get(4)?,
        })
    })?;
    for row in rows {
        out.push(row?);
    }
    Ok(())
}

fn search_items(
    conn: &Connection,
    query: &str,
    pattern: &str,
    workspace_id: i64,
    cap: i64,
    out: &mut Vec<SearchResult>,
) -> StoreResult<()> {
    let mut stmt = conn.prepare(
        "SELECT i.id, i.database_id, i.properties, i.position, i.archived, i.created_by,
                i.created_at, i.updated_at, d.name, d.icon
         FROM database_items i JOIN databases d ON d.id = i.database_id
         WHERE d.workspace_id = ?1 AND i.archived = 0 AND i.properties LIKE ?2 ESCAPE '\\'
         LIMIT ?3",
    )?;
    let rows = stmt.query_map(params![workspace_id, pattern, cap], |row| {
        let item = crate::store::databases::item_from_row(row)?;
        let database_name: String = row.get(8)?;
        let icon: Option<String> = row.get(9)?;
        let title = item.title();
        let content = item.properties.to_string();
        Ok(SearchResult {
            id: item.id,
            kind: ResultKind::DatabaseItem,
            relevance: relevance(query, &title, &content),
            title: format!("{database_name}: {title}"),
            content: Some(content),
            icon: icon.unwrap_or_else(|| DATABASE_ICON.to_string()),
            url: format!("/databases/{}", item.database_id),
            updated_at: item.updated_at,
        })
    })?;
    for row in rows {
        out.push(row?);
    }
    Ok(())
}

fn search_events(
    conn: &Connection,
    query: &str,
    pattern: &str,
    user_id: i64,
    cap: i64,
    out: &mut Vec<SearchResult>,
) -> StoreResult<()> {
    let mut stmt = conn.prepare(
        "SELECT id, title, icon, start_time, updated_at FROM timeline_events
         WHERE user_id = ?1 AND title LIKE ?2 ESCAPE '\\'
         LIMIT ?3",
    )?;
    let rows = stmt.query_map(params![user_id, pattern, cap], |row| {
        let title: String = row.get(1)?;
        let icon: Option<String> = row.get(2)?;
        let start: DateTime<Utc> = row.get(3)?;
        Ok(SearchResult {
            id: row.get(0)?,
            kind: ResultKind::TimelineEvent,
            relevance: relevance(query, &title, ""),
            title,
            content: None,
            icon: icon.unwrap_or_else(|| EVENT_ICON.to_string()),
            url: format!("/timeline?date={}", start.format("%Y-%m-%d")),
            updated_at: row.get(4)?,
        })
    })?;
    for row in rows {
        out.push(row?);
    }
    Ok(())
}

fn search_comments(
    conn: &Connection,
    query: &str,
    pattern: &str,
    workspace_id: i64,
    cap: i64,
    out: &mut Vec<SearchResult>,
) -> StoreResult<()> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.content, c.updated_at, p.id, p.title
         FROM comments c JOIN pages p ON c.parent_type = 'page' AND p.id = c.parent_id
         WHERE p.workspace_id = ?1 AND p.archived = 0 AND c.archived = 0
           AND c.content LIKE ?2 ESCAPE '\\'
         LIMIT ?3",
    )?;
    let rows = stmt.query_map(params![workspace_id, pattern, cap], |row| {
        let content: String = row.get(1)?;
        let page_id: i64 = row.get(3)?;
        let page_title: String = row.get(4)?;
        Ok(SearchResult {
            id: row.get(0)?,
            kind: ResultKind::Comment,
            relevance: relevance(query, &page_title, &content),
            content: Some(snippet(&content, query)),
            title: format!("Comment on {page_title}"),
            icon: COMMENT_ICON.to_string(),
            url: format!("/pages/{page_id}"),
            updated_at: row.get(2)?,
        })
    })?;
    for row in rows {
        out.push(row?);
    }
    Ok(())
}
