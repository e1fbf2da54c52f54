//! Document storage operations.

use rusqlite::{params, Connection, Row};

use super::models::{now_unix, Document};
use crate::embeddings::encode_embedding;
use crate::error::StorageError;
use crate::Result;

pub(crate) fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    let tags_json: String = row.get(4)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();

    Ok(Document {
        id: Some(row.get(0)?),
        title: row.get(1)?,
        content: row.get(2)?,
        category: row.get(3)?,
        tags,
        source: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        embedding: None,
    })
}

/// Insert a new document, returning its id.
///
/// Timestamps are stamped at insert time; the caller-provided values are
/// ignored.
///
/// # Errors
///
/// Returns an error if JSON serialization or database insertion fails.
pub fn insert_document(conn: &Connection, document: &Document) -> Result<i64> {
    let tags_json = serde_json::to_string(&document.tags)
        .map_err(|e| StorageError::Database(format!("failed to serialize tags: {e}")))?;
    let blob = document.embedding.as_deref().map(encode_embedding);
    let now = now_unix();

    conn.execute(
        "INSERT INTO documents (title, content, category, tags, source, embedding, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            document.title,
            document.content,
            document.category,
            tags_json,
            document.source,
            blob,
            now,
            now,
        ],
    )
    .map_err(|e| StorageError::Database(format!("failed to insert document: {e}")))?;

    let id = conn.last_insert_rowid();
    tracing::trace!(id, title = %document.title, "Inserted document");
    Ok(id)
}

/// Get a document by id.
///
/// # Errors
///
/// Returns a not-found error if absent, or a database error on failure.
pub fn get_document(conn: &Connection, id: i64) -> Result<Document> {
    conn.query_row(
        "SELECT id, title, content, category, tags, source, created_at, updated_at
         FROM documents WHERE id = ?",
        [id],
        row_to_document,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            StorageError::not_found("document", id.to_string()).into()
        }
        e => StorageError::Database(format!("failed to get document: {e}")).into(),
    })
}

/// Delete a document by id, returning its title.
///
/// # Errors
///
/// Returns a not-found error if absent, or a database error on failure.
pub fn delete_document(conn: &Connection, id: i64) -> Result<String> {
    let title: String = conn
        .query_row("SELECT title FROM documents WHERE id = ?", [id], |row| {
            row.get(0)
        })
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                crate::Error::from(StorageError::not_found("document", id.to_string()))
            }
            e => StorageError::Database(format!("failed to get document: {e}")).into(),
        })?;

    conn.execute("DELETE FROM documents WHERE id = ?", [id])
        .map_err(|e| StorageError::Database(format!("failed to delete document: {e}")))?;

    tracing::debug!(id, title = %title, "Deleted document");
    Ok(title)
}

/// List all documents in insertion order.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_documents(conn: &Connection) -> Result<Vec<Document>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, title, content, category, tags, source, created_at, updated_at
             FROM documents ORDER BY id",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let rows = stmt
        .query_map([], row_to_document)
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let mut documents = Vec::new();
    for row in rows {
        documents.push(row.map_err(|e| StorageError::Database(e.to_string()))?);
    }
    Ok(documents)
}

/// Overwrite a document's stored embedding.
///
/// # Errors
///
/// Returns a not-found error if absent, or a database error on failure.
pub fn update_document_embedding(
    conn: &Connection,
    id: i64,
    embedding: Option<&[f32]>,
) -> Result<()> {
    let blob = embedding.map(encode_embedding);
    let rows = conn
        .execute(
            "UPDATE documents SET embedding = ? WHERE id = ?",
            params![blob, id],
        )
        .map_err(|e| StorageError::Database(format!("failed to update embedding: {e}")))?;

    if rows == 0 {
        return Err(StorageError::not_found("document", id.to_string()).into());
    }
    Ok(())
}

/// Count total documents.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_documents(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}
