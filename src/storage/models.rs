//! Data models for storage operations.
//!
//! This module defines the core record kinds held by the store:
//! - Prose documents
//! - Code snippets
//! - API function reference entries
//! - Hook reference entries
//! plus the search-history entry and the scored search hit wrapper.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp.
pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(0))
        .unwrap_or(0)
}

/// A prose documentation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Database primary key; `None` until inserted.
    #[serde(default)]
    pub id: Option<i64>,

    /// Document title.
    pub title: String,

    /// Full document body.
    pub content: String,

    /// Free-text category label (e.g. "tutorial", "guide").
    pub category: String,

    /// Tags for categorization, order preserved.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Provenance: file path or URL the document came from.
    #[serde(default)]
    pub source: Option<String>,

    /// Unix timestamp when created.
    #[serde(default)]
    pub created_at: i64,

    /// Unix timestamp when last updated.
    #[serde(default)]
    pub updated_at: i64,

    /// Embedding vector, populated at insert time.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    /// Create a new document record.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        let now = now_unix();
        Self {
            id: None,
            title: title.into(),
            content: content.into(),
            category: category.into(),
            tags: Vec::new(),
            source: None,
            created_at: now,
            updated_at: now,
            embedding: None,
        }
    }

    /// Set the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the provenance string.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the embedding vector.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// The text the embedding is derived from.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }
}

/// A reusable code snippet record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSnippet {
    /// Database primary key; `None` until inserted.
    #[serde(default)]
    pub id: Option<i64>,

    /// Snippet title.
    pub title: String,

    /// The code itself.
    pub code: String,

    /// Programming language; also picks the file extension on export.
    pub language: String,

    /// Optional human description.
    #[serde(default)]
    pub description: Option<String>,

    /// Tags for categorization, order preserved.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Unix timestamp when created.
    #[serde(default)]
    pub created_at: i64,

    /// Unix timestamp when last updated.
    #[serde(default)]
    pub updated_at: i64,

    /// Embedding vector, populated at insert time.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl CodeSnippet {
    /// Create a new code snippet record.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        code: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        let now = now_unix();
        Self {
            id: None,
            title: title.into(),
            code: code.into(),
            language: language.into(),
            description: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            embedding: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the embedding vector.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// The text the embedding is derived from.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {} {}",
            self.title,
            self.description.as_deref().unwrap_or(""),
            self.code
        )
    }
}

/// An API function reference entry, unique by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Database primary key; reassigned when the name is overwritten.
    #[serde(default)]
    pub id: Option<i64>,

    /// Function name; the natural key for this kind.
    pub function_name: String,

    /// Full signature.
    pub signature: String,

    /// What the function does.
    #[serde(default)]
    pub description: Option<String>,

    /// Parameter name to description, order preserved.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,

    /// Description of the return value.
    #[serde(default)]
    pub return_value: Option<String>,

    /// Example usage.
    #[serde(default)]
    pub example: Option<String>,

    /// Version the function first appeared in.
    #[serde(default)]
    pub version_added: Option<String>,

    /// Whether the function is deprecated.
    #[serde(default)]
    pub deprecated: bool,

    /// Source file where the function is defined.
    #[serde(default)]
    pub source_file: Option<String>,

    /// Unix timestamp when created.
    #[serde(default)]
    pub created_at: i64,

    /// Unix timestamp when last updated.
    #[serde(default)]
    pub updated_at: i64,

    /// Embedding vector, populated at insert time.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl FunctionRecord {
    /// Create a new function record.
    #[must_use]
    pub fn new(function_name: impl Into<String>, signature: impl Into<String>) -> Self {
        let now = now_unix();
        Self {
            id: None,
            function_name: function_name.into(),
            signature: signature.into(),
            description: None,
            parameters: BTreeMap::new(),
            return_value: None,
            example: None,
            version_added: None,
            deprecated: false,
            source_file: None,
            created_at: now,
            updated_at: now,
            embedding: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the parameter map.
    #[must_use]
    pub fn with_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the return value description.
    #[must_use]
    pub fn with_return_value(mut self, return_value: impl Into<String>) -> Self {
        self.return_value = Some(return_value.into());
        self
    }

    /// Set the example usage.
    #[must_use]
    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    /// Set the version the function first appeared in.
    #[must_use]
    pub fn with_version_added(mut self, version: impl Into<String>) -> Self {
        self.version_added = Some(version.into());
        self
    }

    /// Mark the function deprecated.
    #[must_use]
    pub const fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    /// Set the source file.
    #[must_use]
    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    /// Set the embedding vector.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// The text the embedding is derived from.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {} {}",
            self.function_name,
            self.signature,
            self.description.as_deref().unwrap_or("")
        )
    }
}

/// A hook reference entry, unique by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookRecord {
    /// Database primary key; reassigned when the name is overwritten.
    #[serde(default)]
    pub id: Option<i64>,

    /// Hook name; the natural key for this kind.
    pub hook_name: String,

    /// Hook flavor, conventionally "action" or "filter" (not enforced).
    pub hook_type: String,

    /// What the hook does.
    #[serde(default)]
    pub description: Option<String>,

    /// Parameter name to description, order preserved.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,

    /// Source file where the hook is fired.
    #[serde(default)]
    pub source_file: Option<String>,

    /// Example usage.
    #[serde(default)]
    pub example: Option<String>,

    /// Version the hook first appeared in.
    #[serde(default)]
    pub version_added: Option<String>,

    /// Unix timestamp when created.
    #[serde(default)]
    pub created_at: i64,

    /// Unix timestamp when last updated.
    #[serde(default)]
    pub updated_at: i64,

    /// Embedding vector, populated at insert time.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl HookRecord {
    /// Create a new hook record.
    #[must_use]
    pub fn new(hook_name: impl Into<String>, hook_type: impl Into<String>) -> Self {
        let now = now_unix();
        Self {
            id: None,
            hook_name: hook_name.into(),
            hook_type: hook_type.into(),
            description: None,
            parameters: BTreeMap::new(),
            source_file: None,
            example: None,
            version_added: None,
            created_at: now,
            updated_at: now,
            embedding: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the parameter map.
    #[must_use]
    pub fn with_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the source file.
    #[must_use]
    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    /// Set the example usage.
    #[must_use]
    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    /// Set the version the hook first appeared in.
    #[must_use]
    pub fn with_version_added(mut self, version: impl Into<String>) -> Self {
        self.version_added = Some(version.into());
        self
    }

    /// Set the embedding vector.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// The text the embedding is derived from.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {} {}",
            self.hook_name,
            self.hook_type,
            self.description.as_deref().unwrap_or("")
        )
    }
}

/// One row of the append-only search log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEntry {
    /// Database primary key.
    pub id: i64,

    /// The raw query as submitted.
    pub query: String,

    /// Total results across all requested categories, patched in after the
    /// search completes.
    pub result_count: i64,

    /// Unix timestamp when the search ran.
    pub timestamp: i64,
}

/// A search result with its relevance score.
///
/// Keyword matches carry `relevance == 1.0`; semantic matches carry their
/// cosine similarity.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit<T> {
    /// The matching record.
    #[serde(flatten)]
    pub record: T,

    /// Relevance score in `[0, 1]`.
    pub relevance: f32,
}

impl<T> SearchHit<T> {
    /// Wrap a keyword match.
    #[must_use]
    pub const fn keyword(record: T) -> Self {
        Self {
            record,
            relevance: 1.0,
        }
    }

    /// Wrap a semantic match with its similarity score.
    #[must_use]
    pub const fn semantic(record: T, similarity: f32) -> Self {
        Self {
            record,
            relevance: similarity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_new() {
        let doc = Document::new("Caching Basics", "Use transients for caching.", "guide");

        assert!(doc.id.is_none());
        assert_eq!(doc.title, "Caching Basics");
        assert_eq!(doc.content, "Use transients for caching.");
        assert_eq!(doc.category, "guide");
        assert!(doc.tags.is_empty());
        assert!(doc.source.is_none());
        assert!(doc.created_at > 0);
        assert!(doc.embedding.is_none());
    }

    #[test]
    fn test_document_builder() {
        let doc = Document::new("T", "C", "ref")
            .with_tags(vec!["a".to_string(), "b".to_string()])
            .with_source("docs/t.md")
            .with_embedding(vec![0.1, 0.2]);

        assert_eq!(doc.tags, vec!["a", "b"]);
        assert_eq!(doc.source, Some("docs/t.md".to_string()));
        assert!(doc.embedding.is_some());
    }

    #[test]
    fn test_document_embedding_text() {
        let doc = Document::new("Title", "Body", "guide");
        assert_eq!(doc.embedding_text(), "Title Body");
    }

    #[test]
    fn test_snippet_embedding_text_includes_description() {
        let snippet = CodeSnippet::new("Transient Example", "set_transient();", "php")
            .with_description("caching helper");
        assert_eq!(
            snippet.embedding_text(),
            "Transient Example caching helper set_transient();"
        );

        let bare = CodeSnippet::new("Bare", "x();", "js");
        assert_eq!(bare.embedding_text(), "Bare  x();");
    }

    #[test]
    fn test_function_record_builder() {
        let mut params = BTreeMap::new();
        params.insert("$name".to_string(), "Option name".to_string());

        let func = FunctionRecord::new("get_option", "get_option($name)")
            .with_description("Fetch an option")
            .with_parameters(params.clone())
            .with_return_value("mixed")
            .with_example("get_option('siteurl');")
            .with_version_added("1.5.0")
            .deprecated(false)
            .with_source_file("wp-includes/option.php");

        assert_eq!(func.function_name, "get_option");
        assert_eq!(func.parameters, params);
        assert!(!func.deprecated);
        assert_eq!(
            func.embedding_text(),
            "get_option get_option($name) Fetch an option"
        );
    }

    #[test]
    fn test_hook_record_builder() {
        let hook = HookRecord::new("init", "action").with_description("Fires after setup");

        assert_eq!(hook.hook_name, "init");
        assert_eq!(hook.hook_type, "action");
        assert_eq!(hook.embedding_text(), "init action Fires after setup");
    }

    #[test]
    fn test_search_hit_scores() {
        let doc = Document::new("T", "C", "guide");
        let kw = SearchHit::keyword(doc.clone());
        assert!((kw.relevance - 1.0).abs() < f32::EPSILON);

        let sem = SearchHit::semantic(doc, 0.82);
        assert!((sem.relevance - 0.82).abs() < f32::EPSILON);
    }

    #[test]
    fn test_function_record_deserialize_defaults() {
        let json = r#"{"function_name": "add_action", "signature": "add_action($tag, $cb)"}"#;
        let func: FunctionRecord = serde_json::from_str(json).unwrap();

        assert_eq!(func.function_name, "add_action");
        assert!(func.parameters.is_empty());
        assert!(!func.deprecated);
        assert!(func.id.is_none());
    }

    #[test]
    fn test_document_serialization_skips_embedding() {
        let doc = Document::new("T", "C", "guide").with_embedding(vec![1.0]);
        let json = serde_json::to_string(&doc).unwrap();
        assert!(!json.contains("embedding"));

        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back.title, "T");
        assert!(back.embedding.is_none());
    }
}
