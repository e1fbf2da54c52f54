//! Keyword + semantic retrieval.
//!
//! Each record kind is searched the same way: a substring pass over its
//! text fields first, then, when a query embedding is supplied and the
//! keyword pass left room under the limit, a similarity pass over records
//! the keyword pass did not already match. Keyword hits always rank ahead
//! of semantic hits.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::documents::row_to_document;
use super::functions::row_to_function;
use super::hooks::row_to_hook;
use super::models::{CodeSnippet, Document, FunctionRecord, HookRecord, SearchHit};
use super::snippets::row_to_snippet;
use crate::embeddings::{cosine_similarity, decode_embedding};
use crate::error::StorageError;
use crate::Result;

/// A searchable record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Prose documents.
    Documents,
    /// Code snippets.
    CodeSnippets,
    /// API function reference.
    Functions,
    /// Hook reference.
    Hooks,
}

impl Category {
    /// All categories, in canonical order.
    pub const ALL: [Self; 4] = [
        Self::Documents,
        Self::CodeSnippets,
        Self::Functions,
        Self::Hooks,
    ];

    /// Stable string form, matching the search response keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Documents => "documents",
            Self::CodeSnippets => "code_snippets",
            Self::Functions => "functions",
            Self::Hooks => "hooks",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "documents" => Ok(Self::Documents),
            "code_snippets" => Ok(Self::CodeSnippets),
            "functions" => Ok(Self::Functions),
            "hooks" => Ok(Self::Hooks),
            other => Err(crate::Error::validation(format!(
                "unknown category '{other}', expected one of: documents, code_snippets, functions, hooks"
            ))),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options controlling a single search pass.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of results per category.
    pub limit: usize,

    /// Whether the semantic fallback may run at all.
    pub use_semantic: bool,

    /// Minimum cosine similarity for a semantic hit.
    pub threshold: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            use_semantic: true,
            threshold: 0.7,
        }
    }
}

impl SearchOptions {
    /// Create new search options with a limit.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    /// Enable or disable the semantic fallback.
    #[must_use]
    pub const fn with_semantic(mut self, use_semantic: bool) -> Self {
        self.use_semantic = use_semantic;
        self
    }

    /// Set the similarity threshold, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }
}

/// Sort semantic candidates by descending similarity and append enough of
/// them to reach the limit.
fn fill_from_semantic<T>(
    hits: &mut Vec<SearchHit<T>>,
    mut candidates: Vec<(T, f32)>,
    limit: usize,
) {
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let room = limit.saturating_sub(hits.len());
    hits.extend(
        candidates
            .into_iter()
            .take(room)
            .map(|(record, similarity)| SearchHit::semantic(record, similarity)),
    );
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Search documents by keyword over title and content, with semantic fill.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub fn search_documents(
    conn: &Connection,
    query: &str,
    query_embedding: Option<&[f32]>,
    options: &SearchOptions,
) -> Result<Vec<SearchHit<Document>>> {
    let pattern = format!("%{query}%");

    let mut stmt = conn
        .prepare(
            "SELECT id, title, content, category, tags, source, created_at, updated_at
             FROM documents
             WHERE title LIKE ? OR content LIKE ?
             ORDER BY id
             LIMIT ?",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let rows = stmt
        .query_map(
            rusqlite::params![&pattern, &pattern, sql_limit(options.limit)],
            row_to_document,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let mut hits = Vec::new();
    for row in rows {
        let doc = row.map_err(|e| StorageError::Database(e.to_string()))?;
        hits.push(SearchHit::keyword(doc));
    }

    if let Some(query_embedding) = query_embedding {
        if hits.len() < options.limit {
            let matched: HashSet<i64> = hits.iter().filter_map(|h| h.record.id).collect();

            let mut stmt = conn
                .prepare(
                    "SELECT id, title, content, category, tags, source, created_at, updated_at, embedding
                     FROM documents
                     WHERE embedding IS NOT NULL",
                )
                .map_err(|e| StorageError::Database(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| {
                    let doc = row_to_document(row)?;
                    let blob: Vec<u8> = row.get(8)?;
                    Ok((doc, blob))
                })
                .map_err(|e| StorageError::Database(e.to_string()))?;

            let mut candidates = Vec::new();
            for row in rows {
                let (doc, blob) = row.map_err(|e| StorageError::Database(e.to_string()))?;
                if doc.id.is_some_and(|id| matched.contains(&id)) {
                    continue;
                }
                let similarity = cosine_similarity(query_embedding, &decode_embedding(&blob));
                if similarity > options.threshold {
                    candidates.push((doc, similarity));
                }
            }

            fill_from_semantic(&mut hits, candidates, options.limit);
        }
    }

    Ok(hits)
}

/// Search code snippets by keyword over title, code and description, with
/// semantic fill.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub fn search_snippets(
    conn: &Connection,
    query: &str,
    query_embedding: Option<&[f32]>,
    options: &SearchOptions,
) -> Result<Vec<SearchHit<CodeSnippet>>> {
    let pattern = format!("%{query}%");

    let mut stmt = conn
        .prepare(
            "SELECT id, title, code, language, description, tags, created_at, updated_at
             FROM code_snippets
             WHERE title LIKE ? OR code LIKE ? OR description LIKE ?
             ORDER BY id
             LIMIT ?",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let rows = stmt
        .query_map(
            rusqlite::params![&pattern, &pattern, &pattern, sql_limit(options.limit)],
            row_to_snippet,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let mut hits = Vec::new();
    for row in rows {
        let snippet = row.map_err(|e| StorageError::Database(e.to_string()))?;
        hits.push(SearchHit::keyword(snippet));
    }

    if let Some(query_embedding) = query_embedding {
        if hits.len() < options.limit {
            let matched: HashSet<i64> = hits.iter().filter_map(|h| h.record.id).collect();

            let mut stmt = conn
                .prepare(
                    "SELECT id, title, code, language, description, tags, created_at, updated_at, embedding
                     FROM code_snippets
                     WHERE embedding IS NOT NULL",
                )
                .map_err(|e| StorageError::Database(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| {
                    let snippet = row_to_snippet(row)?;
                    let blob: Vec<u8> = row.get(8)?;
                    Ok((snippet, blob))
                })
                .map_err(|e| StorageError::Database(e.to_string()))?;

            let mut candidates = Vec::new();
            for row in rows {
                let (snippet, blob) = row.map_err(|e| StorageError::Database(e.to_string()))?;
                if snippet.id.is_some_and(|id| matched.contains(&id)) {
                    continue;
                }
                let similarity = cosine_similarity(query_embedding, &decode_embedding(&blob));
                if similarity > options.threshold {
                    candidates.push((snippet, similarity));
                }
            }

            fill_from_semantic(&mut hits, candidates, options.limit);
        }
    }

    Ok(hits)
}

/// Search functions by keyword over name, signature and description, with
/// semantic fill.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub fn search_functions(
    conn: &Connection,
    query: &str,
    query_embedding: Option<&[f32]>,
    options: &SearchOptions,
) -> Result<Vec<SearchHit<FunctionRecord>>> {
    let pattern = format!("%{query}%");

    let mut stmt = conn
        .prepare(
            "SELECT id, function_name, signature, description, parameters, return_value,
                    example, version_added, deprecated, source_file, created_at, updated_at
             FROM functions
             WHERE function_name LIKE ? OR signature LIKE ? OR description LIKE ?
             ORDER BY id
             LIMIT ?",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let rows = stmt
        .query_map(
            rusqlite::params![&pattern, &pattern, &pattern, sql_limit(options.limit)],
            row_to_function,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let mut hits = Vec::new();
    for row in rows {
        let function = row.map_err(|e| StorageError::Database(e.to_string()))?;
        hits.push(SearchHit::keyword(function));
    }

    if let Some(query_embedding) = query_embedding {
        if hits.len() < options.limit {
            let matched: HashSet<i64> = hits.iter().filter_map(|h| h.record.id).collect();

            let mut stmt = conn
                .prepare(
                    "SELECT id, function_name, signature, description, parameters, return_value,
                            example, version_added, deprecated, source_file, created_at, updated_at,
                            embedding
                     FROM functions
                     WHERE embedding IS NOT NULL",
                )
                .map_err(|e| StorageError::Database(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| {
                    let function = row_to_function(row)?;
                    let blob: Vec<u8> = row.get(12)?;
                    Ok((function, blob))
                })
                .map_err(|e| StorageError::Database(e.to_string()))?;

            let mut candidates = Vec::new();
            for row in rows {
                let (function, blob) = row.map_err(|e| StorageError::Database(e.to_string()))?;
                if function.id.is_some_and(|id| matched.contains(&id)) {
                    continue;
                }
                let similarity = cosine_similarity(query_embedding, &decode_embedding(&blob));
                if similarity > options.threshold {
                    candidates.push((function, similarity));
                }
            }

            fill_from_semantic(&mut hits, candidates, options.limit);
        }
    }

    Ok(hits)
}

/// Search hooks by keyword over name and description, with semantic fill.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub fn search_hooks(
    conn: &Connection,
    query: &str,
    query_embedding: Option<&[f32]>,
    options: &SearchOptions,
) -> Result<Vec<SearchHit<HookRecord>>> {
    let pattern = format!("%{query}%");

    let mut stmt = conn
        .prepare(
            "SELECT id, hook_name, hook_type, description, parameters, source_file,
                    example, version_added, created_at, updated_at
             FROM hooks
             WHERE hook_name LIKE ? OR description LIKE ?
             ORDER BY id
             LIMIT ?",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let rows = stmt
        .query_map(
            rusqlite::params![&pattern, &pattern, sql_limit(options.limit)],
            row_to_hook,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let mut hits = Vec::new();
    for row in rows {
        let hook = row.map_err(|e| StorageError::Database(e.to_string()))?;
        hits.push(SearchHit::keyword(hook));
    }

    if let Some(query_embedding) = query_embedding {
        if hits.len() < options.limit {
            let matched: HashSet<i64> = hits.iter().filter_map(|h| h.record.id).collect();

            let mut stmt = conn
                .prepare(
                    "SELECT id, hook_name, hook_type, description, parameters, source_file,
                            example, version_added, created_at, updated_at, embedding
                     FROM hooks
                     WHERE embedding IS NOT NULL",
                )
                .map_err(|e| StorageError::Database(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| {
                    let hook = row_to_hook(row)?;
                    let blob: Vec<u8> = row.get(10)?;
                    Ok((hook, blob))
                })
                .map_err(|e| StorageError::Database(e.to_string()))?;

            let mut candidates = Vec::new();
            for row in rows {
                let (hook, blob) = row.map_err(|e| StorageError::Database(e.to_string()))?;
                if hook.id.is_some_and(|id| matched.contains(&id)) {
                    continue;
                }
                let similarity = cosine_similarity(query_embedding, &decode_embedding(&blob));
                if similarity > options.threshold {
                    candidates.push((hook, similarity));
                }
            }

            fill_from_semantic(&mut hits, candidates, options.limit);
        }
    }

    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{EmbeddingProvider, HashEmbedding};
    use crate::storage::{insert_document, migrate, Database};

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| migrate(conn)).unwrap();
        db
    }

    fn embedded_doc(title: &str, content: &str, category: &str) -> Document {
        let doc = Document::new(title, content, category);
        let embedding = HashEmbedding::new().embed(&doc.embedding_text()).unwrap();
        doc.with_embedding(embedding)
    }

    #[test]
    fn test_keyword_match_scores_one() {
        let db = setup_db();

        db.with_conn(|conn| {
            insert_document(
                conn,
                &Document::new("Enqueue Scripts Guide", "How to enqueue", "guide"),
            )?;

            let hits = search_documents(conn, "Enqueue", None, &SearchOptions::default())?;
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].record.title, "Enqueue Scripts Guide");
            assert!((hits[0].relevance - 1.0).abs() < f32::EPSILON);

            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_keyword_case_insensitive_ascii() {
        let db = setup_db();

        db.with_conn(|conn| {
            insert_document(conn, &Document::new("Caching Basics", "Transients", "guide"))?;

            let hits = search_documents(conn, "caching", None, &SearchOptions::default())?;
            assert_eq!(hits.len(), 1);

            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_semantic_fill_above_threshold() {
        let db = setup_db();

        db.with_conn(|conn| {
            // No contiguous substring of the query appears in the document,
            // but nearly all tokens overlap.
            insert_document(
                conn,
                &embedded_doc("Transient Expiry", "caching transients expiry", "guide"),
            )?;

            let provider = HashEmbedding::new();
            let query = "transients caching expiry";
            let query_embedding = provider.embed(query).unwrap();

            // Keyword-only finds nothing
            let keyword_only = search_documents(conn, query, None, &SearchOptions::default())?;
            assert!(keyword_only.is_empty());

            // Semantic pass fills it in with its similarity as relevance
            let hits = search_documents(
                conn,
                query,
                Some(&query_embedding),
                &SearchOptions::default(),
            )?;
            assert_eq!(hits.len(), 1);
            assert!(hits[0].relevance > 0.7);
            assert!(hits[0].relevance < 1.0);

            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_semantic_below_threshold_excluded() {
        let db = setup_db();

        db.with_conn(|conn| {
            insert_document(
                conn,
                &embedded_doc("Unrelated", "completely different topic words", "misc"),
            )?;

            let provider = HashEmbedding::new();
            let query_embedding = provider.embed("transients caching expiry").unwrap();

            let hits = search_documents(
                conn,
                "transients caching expiry",
                Some(&query_embedding),
                &SearchOptions::default(),
            )?;
            assert!(hits.is_empty());

            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_keyword_hit_not_duplicated_by_semantic_pass() {
        let db = setup_db();

        db.with_conn(|conn| {
            // Both keyword- and embedding-close to the query
            insert_document(
                conn,
                &embedded_doc("caching transients", "caching transients", "guide"),
            )?;

            let provider = HashEmbedding::new();
            let query = "caching transients";
            let query_embedding = provider.embed(query).unwrap();

            let hits = search_documents(
                conn,
                query,
                Some(&query_embedding),
                &SearchOptions::default(),
            )?;

            assert_eq!(hits.len(), 1);
            // The keyword score wins; the record is never re-scored
            assert!((hits[0].relevance - 1.0).abs() < f32::EPSILON);

            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_limit_applies_across_both_passes() {
        let db = setup_db();

        db.with_conn(|conn| {
            for i in 0..5 {
                insert_document(
                    conn,
                    &Document::new(format!("caching doc {i}"), "caching", "guide"),
                )?;
            }
            for i in 0..5 {
                insert_document(
                    conn,
                    &embedded_doc(
                        &format!("related {i}"),
                        "rules for expiry of caching transients",
                        "guide",
                    ),
                )?;
            }

            let provider = HashEmbedding::new();
            let query_embedding = provider.embed("caching").unwrap();

            let options = SearchOptions::new(3);
            let hits = search_documents(conn, "caching", Some(&query_embedding), &options)?;
            assert_eq!(hits.len(), 3);

            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_semantic_results_sorted_descending() {
        let db = setup_db();

        db.with_conn(|conn| {
            // Different token overlap with the query gives distinct scores
            insert_document(
                conn,
                &embedded_doc("close", "expiry of caching transients", "guide"),
            )?;
            insert_document(
                conn,
                &embedded_doc(
                    "further",
                    "expiry of caching transients plus many extra unrelated filler tokens here",
                    "guide",
                ),
            )?;

            let provider = HashEmbedding::new();
            let query_embedding = provider.embed("transients caching expiry close").unwrap();

            let hits = search_documents(
                conn,
                "zzz-no-keyword-match",
                Some(&query_embedding),
                &SearchOptions::default().with_threshold(0.1),
            )?;

            assert!(hits.len() >= 2);
            assert!(hits[0].relevance >= hits[1].relevance);

            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_category_string_roundtrip() {
        for category in Category::ALL {
            let parsed: Category = category.as_str().parse().unwrap();
            assert_eq!(parsed, category);
        }
        assert!("bogus".parse::<Category>().is_err());
    }

    #[test]
    fn test_search_options_builder() {
        let options = SearchOptions::new(5).with_semantic(false).with_threshold(1.5);
        assert_eq!(options.limit, 5);
        assert!(!options.use_semantic);
        assert!((options.threshold - 1.0).abs() < f32::EPSILON);
    }
}
