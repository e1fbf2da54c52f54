//! Search history log operations.
//!
//! The log is append-only: a row is written when a search starts and its
//! `result_count` is patched exactly once when the search finishes. It feeds
//! the top-searches and recent-searches analytics only.

use rusqlite::{params, Connection};

use super::models::{now_unix, SearchEntry};
use crate::error::StorageError;
use crate::Result;

/// Record the start of a search, returning the new row id.
///
/// # Errors
///
/// Returns an error if the database insertion fails.
pub fn insert_search(conn: &Connection, query: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO search_history (query, result_count, timestamp) VALUES (?, 0, ?)",
        params![query, now_unix()],
    )
    .map_err(|e| StorageError::Database(format!("failed to record search: {e}")))?;

    Ok(conn.last_insert_rowid())
}

/// Patch the result count of a recorded search.
///
/// # Errors
///
/// Returns an error if the database update fails.
pub fn set_result_count(conn: &Connection, id: i64, count: i64) -> Result<()> {
    conn.execute(
        "UPDATE search_history SET result_count = ? WHERE id = ?",
        params![count, id],
    )
    .map_err(|e| StorageError::Database(format!("failed to update search count: {e}")))?;

    Ok(())
}

/// List recent searches, newest first.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn recent_searches(conn: &Connection, limit: usize) -> Result<Vec<SearchEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, query, result_count, timestamp
             FROM search_history
             ORDER BY timestamp DESC, id DESC
             LIMIT ?",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let rows = stmt
        .query_map([i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            Ok(SearchEntry {
                id: row.get(0)?,
                query: row.get(1)?,
                result_count: row.get(2)?,
                timestamp: row.get(3)?,
            })
        })
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row.map_err(|e| StorageError::Database(e.to_string()))?);
    }
    Ok(entries)
}

/// Delete the entire search history, returning the number of rows removed.
///
/// # Errors
///
/// Returns an error if the database deletion fails.
pub fn clear_history(conn: &Connection) -> Result<u64> {
    let deleted = conn
        .execute("DELETE FROM search_history", [])
        .map_err(|e| StorageError::Database(format!("failed to clear search history: {e}")))?;

    tracing::debug!(deleted, "Cleared search history");
    Ok(deleted as u64)
}

/// Count total recorded searches.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_searches(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM search_history", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}
