//! Store statistics aggregation.

use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::StorageError;
use crate::storage::Database;
use crate::Result;

/// One historical query with its frequency.
#[derive(Debug, Clone, Serialize)]
pub struct QueryCount {
    /// The query text.
    pub query: String,

    /// How many times it was searched.
    pub count: i64,
}

/// One recently created record, across all kinds.
#[derive(Debug, Clone, Serialize)]
pub struct RecentAddition {
    /// Record kind: "document", "code_snippet", "function" or "hook".
    pub kind: String,

    /// Display name (title or name).
    pub name: String,

    /// Unix timestamp when created.
    pub created_at: i64,
}

/// Aggregated store statistics.
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    /// Number of documents.
    pub document_count: i64,

    /// Number of code snippets.
    pub code_snippet_count: i64,

    /// Number of function reference entries.
    pub function_count: i64,

    /// Number of hook reference entries.
    pub hook_count: i64,

    /// Number of recorded searches.
    pub search_count: i64,

    /// Documents per category.
    pub document_categories: BTreeMap<String, i64>,

    /// Snippets per language.
    pub code_snippet_languages: BTreeMap<String, i64>,

    /// Hooks per type.
    pub hook_types: BTreeMap<String, i64>,

    /// Store file size in bytes; `0` for in-memory stores.
    pub database_size_bytes: u64,

    /// Store file size in megabytes, rounded to two decimals.
    pub database_size_mb: f64,

    /// The 10 most frequent historical queries.
    pub top_searches: Vec<QueryCount>,

    /// The 20 most recently created records across all kinds.
    pub recent_additions: Vec<RecentAddition>,
}

fn count_table(conn: &Connection, sql: &str) -> Result<i64> {
    conn.query_row(sql, [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}

fn group_counts(conn: &Connection, sql: &str) -> Result<BTreeMap<String, i64>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let mut counts = BTreeMap::new();
    for row in rows {
        let (key, count) = row.map_err(|e| StorageError::Database(e.to_string()))?;
        counts.insert(key, count);
    }
    Ok(counts)
}

/// Gather the full statistics snapshot.
///
/// # Errors
///
/// Returns an error if any aggregation query fails.
#[allow(clippy::cast_precision_loss)]
pub fn gather_statistics(db: &Database) -> Result<Statistics> {
    // Taken outside the connection lock; `file_size` locks internally.
    let database_size_bytes = db.file_size();
    let database_size_mb =
        (database_size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;

    db.with_conn(|conn| {
        let document_count = count_table(conn, "SELECT COUNT(*) FROM documents")?;
        let code_snippet_count = count_table(conn, "SELECT COUNT(*) FROM code_snippets")?;
        let function_count = count_table(conn, "SELECT COUNT(*) FROM functions")?;
        let hook_count = count_table(conn, "SELECT COUNT(*) FROM hooks")?;
        let search_count = count_table(conn, "SELECT COUNT(*) FROM search_history")?;

        let document_categories = group_counts(
            conn,
            "SELECT category, COUNT(*) FROM documents GROUP BY category",
        )?;
        let code_snippet_languages = group_counts(
            conn,
            "SELECT language, COUNT(*) FROM code_snippets GROUP BY language",
        )?;
        let hook_types = group_counts(conn, "SELECT hook_type, COUNT(*) FROM hooks GROUP BY hook_type")?;

        let mut stmt = conn
            .prepare(
                "SELECT query, COUNT(*) as count
                 FROM search_history
                 GROUP BY query
                 ORDER BY count DESC
                 LIMIT 10",
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(QueryCount {
                    query: row.get(0)?,
                    count: row.get(1)?,
                })
            })
            .map_err(|e| StorageError::Database(e.to_string()))?;
        let mut top_searches = Vec::new();
        for row in rows {
            top_searches.push(row.map_err(|e| StorageError::Database(e.to_string()))?);
        }

        let mut stmt = conn
            .prepare(
                "SELECT 'document' AS kind, title AS name, created_at FROM documents
                 UNION ALL
                 SELECT 'code_snippet', title, created_at FROM code_snippets
                 UNION ALL
                 SELECT 'function', function_name, created_at FROM functions
                 UNION ALL
                 SELECT 'hook', hook_name, created_at FROM hooks
                 ORDER BY created_at DESC
                 LIMIT 20",
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RecentAddition {
                    kind: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })
            .map_err(|e| StorageError::Database(e.to_string()))?;
        let mut recent_additions = Vec::new();
        for row in rows {
            recent_additions.push(row.map_err(|e| StorageError::Database(e.to_string()))?);
        }

        Ok(Statistics {
            document_count,
            code_snippet_count,
            function_count,
            hook_count,
            search_count,
            document_categories,
            code_snippet_languages,
            hook_types,
            database_size_bytes,
            database_size_mb,
            top_searches,
            recent_additions,
        })
    })
}
