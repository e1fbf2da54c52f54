//! Hook reference storage operations.
//!
//! Hooks are unique by `hook_name` with the same delete-then-insert
//! overwrite semantics as functions.

use rusqlite::{params, Connection, Row};
use std::collections::BTreeMap;

use super::models::{now_unix, HookRecord};
use crate::embeddings::encode_embedding;
use crate::error::StorageError;
use crate::Result;

const COLUMNS: &str = "id, hook_name, hook_type, description, parameters, source_file, \
                       example, version_added, created_at, updated_at";

pub(crate) fn row_to_hook(row: &Row<'_>) -> rusqlite::Result<HookRecord> {
    let parameters_json: String = row.get(4)?;
    let parameters: BTreeMap<String, String> =
        serde_json::from_str(&parameters_json).unwrap_or_default();

    Ok(HookRecord {
        id: Some(row.get(0)?),
        hook_name: row.get(1)?,
        hook_type: row.get(2)?,
        description: row.get(3)?,
        parameters,
        source_file: row.get(5)?,
        example: row.get(6)?,
        version_added: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        embedding: None,
    })
}

/// Insert or replace a hook record keyed on `hook_name`.
///
/// Must be called inside a transaction so the delete and insert land
/// atomically.
///
/// # Errors
///
/// Returns an error if JSON serialization or database access fails.
pub fn upsert_hook(conn: &Connection, hook: &HookRecord) -> Result<i64> {
    let parameters_json = serde_json::to_string(&hook.parameters)
        .map_err(|e| StorageError::Database(format!("failed to serialize parameters: {e}")))?;
    let blob = hook.embedding.as_deref().map(encode_embedding);
    let now = now_unix();

    let replaced = conn
        .execute("DELETE FROM hooks WHERE hook_name = ?", [&hook.hook_name])
        .map_err(|e| StorageError::Database(format!("failed to clear prior hook: {e}")))?;

    conn.execute(
        "INSERT INTO hooks (hook_name, hook_type, description, parameters, source_file,
                            example, version_added, embedding, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            hook.hook_name,
            hook.hook_type,
            hook.description,
            parameters_json,
            hook.source_file,
            hook.example,
            hook.version_added,
            blob,
            now,
            now,
        ],
    )
    .map_err(|e| StorageError::Database(format!("failed to insert hook: {e}")))?;

    let id = conn.last_insert_rowid();
    tracing::trace!(id, name = %hook.hook_name, replaced = replaced > 0, "Upserted hook");
    Ok(id)
}

/// Get a hook by id.
///
/// # Errors
///
/// Returns a not-found error if absent, or a database error on failure.
pub fn get_hook(conn: &Connection, id: i64) -> Result<HookRecord> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM hooks WHERE id = ?"),
        [id],
        row_to_hook,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            StorageError::not_found("hook", id.to_string()).into()
        }
        e => StorageError::Database(format!("failed to get hook: {e}")).into(),
    })
}

/// Get a hook by name.
///
/// # Errors
///
/// Returns a not-found error if absent, or a database error on failure.
pub fn get_hook_by_name(conn: &Connection, name: &str) -> Result<HookRecord> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM hooks WHERE hook_name = ?"),
        [name],
        row_to_hook,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("hook", name).into(),
        e => StorageError::Database(format!("failed to get hook: {e}")).into(),
    })
}

/// Delete a hook by id, returning its name.
///
/// # Errors
///
/// Returns a not-found error if absent, or a database error on failure.
pub fn delete_hook(conn: &Connection, id: i64) -> Result<String> {
    let name: String = conn
        .query_row("SELECT hook_name FROM hooks WHERE id = ?", [id], |row| {
            row.get(0)
        })
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                crate::Error::from(StorageError::not_found("hook", id.to_string()))
            }
            e => StorageError::Database(format!("failed to get hook: {e}")).into(),
        })?;

    conn.execute("DELETE FROM hooks WHERE id = ?", [id])
        .map_err(|e| StorageError::Database(format!("failed to delete hook: {e}")))?;

    tracing::debug!(id, name = %name, "Deleted hook");
    Ok(name)
}

/// List all hooks in insertion order.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_hooks(conn: &Connection) -> Result<Vec<HookRecord>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {COLUMNS} FROM hooks ORDER BY id"))
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let rows = stmt
        .query_map([], row_to_hook)
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let mut hooks = Vec::new();
    for row in rows {
        hooks.push(row.map_err(|e| StorageError::Database(e.to_string()))?);
    }
    Ok(hooks)
}

/// Overwrite a hook's stored embedding.
///
/// # Errors
///
/// Returns a not-found error if absent, or a database error on failure.
pub fn update_hook_embedding(conn: &Connection, id: i64, embedding: Option<&[f32]>) -> Result<()> {
    let blob = embedding.map(encode_embedding);
    let rows = conn
        .execute(
            "UPDATE hooks SET embedding = ? WHERE id = ?",
            params![blob, id],
        )
        .map_err(|e| StorageError::Database(format!("failed to update embedding: {e}")))?;

    if rows == 0 {
        return Err(StorageError::not_found("hook", id.to_string()).into());
    }
    Ok(())
}

/// Count total hooks.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_hooks(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM hooks", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}
