//! Databases, their views and their items.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{StoreError, StoreResult, json_column, next_position, to_json_text};
use crate::domain::{
    Database, DatabaseItem, DatabaseUpdate, DatabaseView, ItemUpdate, NewDatabase, NewItem,
    NewView, ViewUpdate,
};

const DATABASE_COLUMNS: &str =
    "id, workspace_id, name, icon, description, schema, created_by, created_at, updated_at";

const VIEW_COLUMNS: &str =
    "id, database_id, name, type, config, position, created_by, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, database_id, properties, position, archived, created_by, created_at, updated_at";

fn database_from_row(row: &Row<'_>) -> rusqlite::Result<Database> {
    Ok(Database {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        name: row.get(2)?,
        icon: row.get(3)?,
        description: row.get(4)?,
        schema: json_column(row, 5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn view_from_row(row: &Row<'_>) -> rusqlite::Result<DatabaseView> {
    Ok(DatabaseView {
        id: row.get(0)?,
        database_id: row.get(1)?,
        name: row.get(2)?,
        view_type: row.get(3)?,
        config: json_column(row, 4)?,
        position: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub(crate) fn item_from_row(row: &Row<'_>) -> rusqlite::Result<DatabaseItem> {
    Ok(DatabaseItem {
        id: row.get(0)?,
        database_id: row.get(1)?,
        properties: json_column(row, 2)?,
        position: row.get(3)?,
        archived: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub fn create_database(
    conn: &Connection,
    user_id: i64,
    input: &NewDatabase,
) -> StoreResult<Database> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO databases (workspace_id, name, icon, description, schema, created_by,
                                created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            input.workspace_id,
            input.name,
            input.icon,
            input.description,
            to_json_text(&input.schema)?,
            user_id,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_database(conn, id)?.ok_or(StoreError::not_found("database", id))
}

pub fn get_database(conn: &Connection, id: i64) -> StoreResult<Option<Database>> {
    let sql = format!("SELECT {DATABASE_COLUMNS} FROM databases WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], database_from_row).optional()?)
}

pub fn list_databases_by_workspace(
    conn: &Connection,
    workspace_id: i64,
) -> StoreResult<Vec<Database>> {
    let sql = format!(
        "SELECT {DATABASE_COLUMNS} FROM databases WHERE workspace_id = ?1 ORDER BY id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([workspace_id], database_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn update_database(
    conn: &Connection,
    id: i64,
    update: &DatabaseUpdate,
) -> StoreResult<Database> {
    let mut database = get_database(conn, id)?.ok_or(StoreError::not_found("database", id))?;

    if let Some(name) = &update.name {
        database.name.clone_from(name);
    }
    if let Some(icon) = &update.icon {
        database.icon.clone_from(icon);
    }
    if let Some(description) = &update.description {
        database.description.clone_from(description);
    }
    if let Some(schema) = &update.schema {
        database.schema = schema.clone();
    }
    database.updated_at = Utc::now();

    conn.execute(
        "UPDATE databases SET name = ?1, icon = ?2, description = ?3, schema = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            database.name,
            database.icon,
            database.description,
            to_json_text(&database.schema)?,
            database.updated_at,
            id,
        ],
    )?;
    Ok(database)
}

pub fn create_view(conn: &Connection, user_id: i64, input: &NewView) -> StoreResult<DatabaseView> {
    let now = Utc::now();
    let position = match input.position {
        Some(position) => position,
        None => next_position(conn, "database_views", "database_id = ?1", &input.database_id)?,
    };
    conn.execute(
        "INSERT INTO database_views (database_id, name, type, config, position, created_by,
                                     created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            input.database_id,
            input.name,
            input.view_type,
            to_json_text(&input.config)?,
            position,
            user_id,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_view(conn, id)?.ok_or(StoreError::not_found("view", id))
}

pub fn get_view(conn: &Connection, id: i64) -> StoreResult<Option<DatabaseView>> {
    let sql = format!("SELECT {VIEW_COLUMNS} FROM database_views WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], view_from_row).optional()?)
}

pub fn list_views(
    conn: &Connection,
    database_id: i64,
) -> StoreResult<Vec<DatabaseView>> {
    let sql = format!(
        "SELECT {VIEW_COLUMNS} FROM database_views WHERE database_id = ?1
         ORDER BY position ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([database_id], view_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn update_view(conn: &Connection, id: i64, update: &ViewUpdate) -> StoreResult<DatabaseView> {
    let mut view = get_view(conn, id)?.ok_or(StoreError::not_found("view", id))?;

    if let Some(name) = &update.name {
        view.name.clone_from(name);
    }
    if let Some(view_type) = update.view_type {
        view.view_type = view_type;
    }
    if let Some(config) = &update.config {
        view.config = config.clone();
    }
    if let Some(position) = update.position {
        view.position = position;
    }
    view.updated_at = Utc::now();

    conn.execute(
        "UPDATE database_views SET name = ?1, type = ?2, config = ?3, position = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            view.name,
            view.view_type,
            to_json_text(&view.config)?,
            view.position,
            view.updated_at,
            id,
        ],
    )?;
    Ok(view)
}

pub fn delete_view(conn: &Connection, id: i64) -> StoreResult<()> {
    let changed = conn.execute("DELETE FROM database_views WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(StoreError::not_found("view", id));
    }
    Ok(())
}

pub fn create_item(conn: &Connection, user_id: i64, input: &NewItem) -> StoreResult<DatabaseItem> {
    if !input.properties.is_object() {
        return Err(StoreError::invalid("properties", "must be a JSON object"));
    }
    let now = Utc::now();
    let position = match input.position {
        Some(position) => position,
        None => next_position(
            conn,
            "database_items",
            "database_id = ?1 AND archived = 0",
            &input.database_id,
        )?,
    };
    conn.execute(
        "INSERT INTO database_items (database_id, properties, position, archived, created_by,
                                     created_at, updated_at)
         VALUES (?1, ?2, ?3, 0, ?4, ?5, ?5)",
        params![
            input.database_id,
            to_json_text(&input.properties)?,
            position,
            user_id,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_item_any(conn, id)?.ok_or(StoreError::not_found("item", id))
}

fn get_item_any(conn: &Connection, id: i64) -> StoreResult<Option<DatabaseItem>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM database_items WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], item_from_row).optional()?)
}

/// Item by id; archived items are hidden.
pub fn get_item(conn: &Connection, id: i64) -> StoreResult<Option<DatabaseItem>> {
    Ok(get_item_any(conn, id)?.filter(|item| !item.archived))
}

pub fn list_items(
    conn: &Connection,
    database_id: i64,
) -> StoreResult<Vec<DatabaseItem>> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM database_items WHERE database_id = ?1 AND archived = 0
         ORDER BY position ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([database_id], item_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Replaces the item's properties and/or position.
pub fn update_item(conn: &Connection, id: i64, update: &ItemUpdate) -> StoreResult<DatabaseItem> {
    let mut item = get_item(conn, id)?.ok_or(StoreError::not_found("item", id))?;

    if let Some(properties) = &update.properties {
        if !properties.is_object() {
            return Err(StoreError::invalid("properties", "must be a JSON object"));
        }
        item.properties = properties.clone();
    }
    if let Some(position) = update.position {
        item.position = position;
    }
    item.updated_at = Utc::now();

    conn.execute(
        "UPDATE database_items SET properties = ?1, position = ?2, updated_at = ?3 WHERE id = ?4",
        params![
            to_json_text(&item.properties)?,
            item.position,
            item.updated_at,
            id,
        ],
    )?;
    Ok(item)
}

pub fn archive_item(conn: &Connection, id: i64) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE database_items SET archived = 1, updated_at = ?1 WHERE id = ?2 AND archived = 0",
        params![Utc::now(), id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("item", id));
    }
    Ok(())
}
