//! API function reference storage operations.
//!
//! Functions are unique by `function_name`. Re-adding an existing name
//! replaces the prior record via an explicit delete-then-insert; the id is
//! reassigned. Callers must run [`upsert_function`] inside a transaction.

use rusqlite::{params, Connection, Row};
use std::collections::BTreeMap;

use super::models::{now_unix, FunctionRecord};
use crate::embeddings::encode_embedding;
use crate::error::StorageError;
use crate::Result;

const COLUMNS: &str = "id, function_name, signature, description, parameters, return_value, \
                       example, version_added, deprecated, source_file, created_at, updated_at";

pub(crate) fn row_to_function(row: &Row<'_>) -> rusqlite::Result<FunctionRecord> {
    let parameters_json: String = row.get(4)?;
    let parameters: BTreeMap<String, String> =
        serde_json::from_str(&parameters_json).unwrap_or_default();

    Ok(FunctionRecord {
        id: Some(row.get(0)?),
        function_name: row.get(1)?,
        signature: row.get(2)?,
        description: row.get(3)?,
        parameters,
        return_value: row.get(5)?,
        example: row.get(6)?,
        version_added: row.get(7)?,
        deprecated: row.get(8)?,
        source_file: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        embedding: None,
    })
}

/// Insert or replace a function record keyed on `function_name`.
///
/// Must be called inside a transaction so the delete and insert land
/// atomically.
///
/// # Errors
///
/// Returns an error if JSON serialization or database access fails.
pub fn upsert_function(conn: &Connection, function: &FunctionRecord) -> Result<i64> {
    let parameters_json = serde_json::to_string(&function.parameters)
        .map_err(|e| StorageError::Database(format!("failed to serialize parameters: {e}")))?;
    let blob = function.embedding.as_deref().map(encode_embedding);
    let now = now_unix();

    let replaced = conn
        .execute(
            "DELETE FROM functions WHERE function_name = ?",
            [&function.function_name],
        )
        .map_err(|e| StorageError::Database(format!("failed to clear prior function: {e}")))?;

    conn.execute(
        "INSERT INTO functions (function_name, signature, description, parameters, return_value,
                                example, version_added, deprecated, source_file, embedding,
                                created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            function.function_name,
            function.signature,
            function.description,
            parameters_json,
            function.return_value,
            function.example,
            function.version_added,
            function.deprecated,
            function.source_file,
            blob,
            now,
            now,
        ],
    )
    .map_err(|e| StorageError::Database(format!("failed to insert function: {e}")))?;

    let id = conn.last_insert_rowid();
    tracing::trace!(
        id,
        name = %function.function_name,
        replaced = replaced > 0,
        "Upserted function"
    );
    Ok(id)
}

/// Get a function by id.
///
/// # Errors
///
/// Returns a not-found error if absent, or a database error on failure.
pub fn get_function(conn: &Connection, id: i64) -> Result<FunctionRecord> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM functions WHERE id = ?"),
        [id],
        row_to_function,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            StorageError::not_found("function", id.to_string()).into()
        }
        e => StorageError::Database(format!("failed to get function: {e}")).into(),
    })
}

/// Get a function by name.
///
/// # Errors
///
/// Returns a not-found error if absent, or a database error on failure.
pub fn get_function_by_name(conn: &Connection, name: &str) -> Result<FunctionRecord> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM functions WHERE function_name = ?"),
        [name],
        row_to_function,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("function", name).into(),
        e => StorageError::Database(format!("failed to get function: {e}")).into(),
    })
}

/// Delete a function by id, returning its name.
///
/// # Errors
///
/// Returns a not-found error if absent, or a database error on failure.
pub fn delete_function(conn: &Connection, id: i64) -> Result<String> {
    let name: String = conn
        .query_row(
            "SELECT function_name FROM functions WHERE id = ?",
            [id],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                crate::Error::from(StorageError::not_found("function", id.to_string()))
            }
            e => StorageError::Database(format!("failed to get function: {e}")).into(),
        })?;

    conn.execute("DELETE FROM functions WHERE id = ?", [id])
        .map_err(|e| StorageError::Database(format!("failed to delete function: {e}")))?;

    tracing::debug!(id, name = %name, "Deleted function");
    Ok(name)
}

/// List all functions in insertion order.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_functions(conn: &Connection) -> Result<Vec<FunctionRecord>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {COLUMNS} FROM functions ORDER BY id"))
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let rows = stmt
        .query_map([], row_to_function)
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let mut functions = Vec::new();
    for row in rows {
        functions.push(row.map_err(|e| StorageError::Database(e.to_string()))?);
    }
    Ok(functions)
}

/// Overwrite a function's stored embedding.
///
/// # Errors
///
/// Returns a not-found error if absent, or a database error on failure.
pub fn update_function_embedding(
    conn: &Connection,
    id: i64,
    embedding: Option<&[f32]>,
) -> Result<()> {
    let blob = embedding.map(encode_embedding);
    let rows = conn
        .execute(
            "UPDATE functions SET embedding = ? WHERE id = ?",
            params![blob, id],
        )
        .map_err(|e| StorageError::Database(format!("failed to update embedding: {e}")))?;

    if rows == 0 {
        return Err(StorageError::not_found("function", id.to_string()).into());
    }
    Ok(())
}

/// Count total functions.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_functions(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM functions", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}
