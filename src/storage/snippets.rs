//! Code snippet storage operations.

use rusqlite::{params, Connection, Row};

use super::models::{now_unix, CodeSnippet};
use crate::embeddings::encode_embedding;
use crate::error::StorageError;
use crate::Result;

pub(crate) fn row_to_snippet(row: &Row<'_>) -> rusqlite::Result<CodeSnippet> {
    let tags_json: String = row.get(5)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();

    Ok(CodeSnippet {
        id: Some(row.get(0)?),
        title: row.get(1)?,
        code: row.get(2)?,
        language: row.get(3)?,
        description: row.get(4)?,
        tags,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        embedding: None,
    })
}

/// Insert a new code snippet, returning its id.
///
/// # Errors
///
/// Returns an error if JSON serialization or database insertion fails.
pub fn insert_snippet(conn: &Connection, snippet: &CodeSnippet) -> Result<i64> {
    let tags_json = serde_json::to_string(&snippet.tags)
        .map_err(|e| StorageError::Database(format!("failed to serialize tags: {e}")))?;
    let blob = snippet.embedding.as_deref().map(encode_embedding);
    let now = now_unix();

    conn.execute(
        "INSERT INTO code_snippets (title, code, language, description, tags, embedding, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            snippet.title,
            snippet.code,
            snippet.language,
            snippet.description,
            tags_json,
            blob,
            now,
            now,
        ],
    )
    .map_err(|e| StorageError::Database(format!("failed to insert code snippet: {e}")))?;

    let id = conn.last_insert_rowid();
    tracing::trace!(id, title = %snippet.title, "Inserted code snippet");
    Ok(id)
}

/// Get a code snippet by id.
///
/// # Errors
///
/// Returns a not-found error if absent, or a database error on failure.
pub fn get_snippet(conn: &Connection, id: i64) -> Result<CodeSnippet> {
    conn.query_row(
        "SELECT id, title, code, language, description, tags, created_at, updated_at
         FROM code_snippets WHERE id = ?",
        [id],
        row_to_snippet,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            StorageError::not_found("code snippet", id.to_string()).into()
        }
        e => StorageError::Database(format!("failed to get code snippet: {e}")).into(),
    })
}

/// Delete a code snippet by id, returning its title.
///
/// # Errors
///
/// Returns a not-found error if absent, or a database error on failure.
pub fn delete_snippet(conn: &Connection, id: i64) -> Result<String> {
    let title: String = conn
        .query_row(
            "SELECT title FROM code_snippets WHERE id = ?",
            [id],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                crate::Error::from(StorageError::not_found("code snippet", id.to_string()))
            }
            e => StorageError::Database(format!("failed to get code snippet: {e}")).into(),
        })?;

    conn.execute("DELETE FROM code_snippets WHERE id = ?", [id])
        .map_err(|e| StorageError::Database(format!("failed to delete code snippet: {e}")))?;

    tracing::debug!(id, title = %title, "Deleted code snippet");
    Ok(title)
}

/// List all code snippets in insertion order.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_snippets(conn: &Connection) -> Result<Vec<CodeSnippet>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, title, code, language, description, tags, created_at, updated_at
             FROM code_snippets ORDER BY id",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let rows = stmt
        .query_map([], row_to_snippet)
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let mut snippets = Vec::new();
    for row in rows {
        snippets.push(row.map_err(|e| StorageError::Database(e.to_string()))?);
    }
    Ok(snippets)
}

/// Overwrite a snippet's stored embedding.
///
/// # Errors
///
/// Returns a not-found error if absent, or a database error on failure.
pub fn update_snippet_embedding(
    conn: &Connection,
    id: i64,
    embedding: Option<&[f32]>,
) -> Result<()> {
    let blob = embedding.map(encode_embedding);
    let rows = conn
        .execute(
            "UPDATE code_snippets SET embedding = ? WHERE id = ?",
            params![blob, id],
        )
        .map_err(|e| StorageError::Database(format!("failed to update embedding: {e}")))?;

    if rows == 0 {
        return Err(StorageError::not_found("code snippet", id.to_string()).into());
    }
    Ok(())
}

/// Count total code snippets.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_snippets(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM code_snippets", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}
