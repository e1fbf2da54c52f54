//! The knowledge store facade.
//!
//! [`KnowledgeStore`] is the one object the embedding agent layer talks to.
//! It owns the database handle and the embedding provider, and exposes the
//! full operation surface: per-kind CRUD, merged keyword + semantic search,
//! statistics, backup/restore, export/import and embedding rebuild.
//!
//! Construct it once at process start and pass it by reference; there is no
//! global instance.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::error::EmbeddingError;
use crate::maintenance::{
    self, BackupInfo, ImportStats, OptimizeReport, Statistics,
};
use crate::storage::{
    self, init_storage, Category, CodeSnippet, Database, Document, FunctionRecord, HookRecord,
    SearchEntry, SearchHit, SearchOptions,
};
use crate::{Error, Result};

/// Parameters for one search call.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// The query text.
    pub query: String,

    /// Categories to search; empty means all four.
    pub categories: Vec<Category>,

    /// Per-category result cap; `None` uses the configured default.
    pub limit: Option<usize>,

    /// Whether the semantic fallback may run.
    pub use_semantic: bool,
}

impl SearchRequest {
    /// Create a request with defaults: all categories, configured limit,
    /// semantic fallback on.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            categories: Vec::new(),
            limit: None,
            use_semantic: true,
        }
    }

    /// Restrict the search to the given categories.
    #[must_use]
    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    /// Cap results per category.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Disable the semantic fallback for this call.
    #[must_use]
    pub const fn keyword_only(mut self) -> Self {
        self.use_semantic = false;
        self
    }
}

/// Ranked results per category plus the combined total.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// The query as submitted.
    pub query: String,

    /// Document hits, keyword first then semantic.
    pub documents: Vec<SearchHit<Document>>,

    /// Code snippet hits.
    pub code_snippets: Vec<SearchHit<CodeSnippet>>,

    /// Function hits.
    pub functions: Vec<SearchHit<FunctionRecord>>,

    /// Hook hits.
    pub hooks: Vec<SearchHit<HookRecord>>,

    /// Total across all searched categories.
    pub total_results: usize,
}

/// Outcome of an embedding rebuild.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RebuildStats {
    /// Documents whose embedding was recomputed.
    pub documents_updated: usize,

    /// Snippets whose embedding was recomputed.
    pub code_snippets_updated: usize,

    /// Functions whose embedding was recomputed.
    pub functions_updated: usize,

    /// Hooks whose embedding was recomputed.
    pub hooks_updated: usize,

    /// Per-record failures, one message each.
    pub errors: Vec<String>,
}

/// Embedded knowledge store with keyword and semantic retrieval.
#[derive(Clone)]
pub struct KnowledgeStore {
    db: Database,
    provider: Arc<dyn EmbeddingProvider>,
    config: Config,
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

impl KnowledgeStore {
    /// Open (or create) the store under the configured data directory.
    ///
    /// An unavailable embedding provider is not an error; the store runs in
    /// keyword-only mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the database
    /// cannot be opened and migrated.
    pub fn open(config: Config, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;

        let db = Database::open(config.database_path())?;
        init_storage(&db)?;

        if provider.is_available() {
            tracing::info!(provider = provider.name(), "Semantic search enabled");
        } else {
            tracing::warn!(
                provider = provider.name(),
                "Embedding provider unavailable, running keyword-only"
            );
        }

        Ok(Self {
            db,
            provider,
            config,
        })
    }

    /// Open an in-memory store, mainly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened and migrated.
    pub fn open_in_memory(provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let db = Database::open_in_memory()?;
        init_storage(&db)?;

        Ok(Self {
            db,
            provider,
            config: Config::default(),
        })
    }

    /// Whether the semantic pass can run at all.
    #[must_use]
    pub fn semantic_search_available(&self) -> bool {
        self.provider.is_available()
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    fn embedding_for(&self, text: &str) -> Option<Vec<f32>> {
        if !self.provider.is_available() {
            return None;
        }
        let embedding = self.provider.embed(text);
        if embedding.is_none() {
            tracing::warn!(provider = self.provider.name(), "Embedding generation failed");
        }
        embedding
    }

    /// Add a document, generating its embedding from title + content.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank title or content, or a storage
    /// error on insert failure.
    pub async fn add_document(&self, mut document: Document) -> Result<i64> {
        require("title", &document.title)?;
        require("content", &document.content)?;

        document.embedding = self.embedding_for(&document.embedding_text());
        let id = self
            .db
            .with_conn(|conn| storage::insert_document(conn, &document))?;

        tracing::info!(id, title = %document.title, "Added document");
        Ok(id)
    }

    /// Add a code snippet, generating its embedding from title +
    /// description + code.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank title or code, or a storage
    /// error on insert failure.
    pub async fn add_code_snippet(&self, mut snippet: CodeSnippet) -> Result<i64> {
        require("title", &snippet.title)?;
        require("code", &snippet.code)?;

        snippet.embedding = self.embedding_for(&snippet.embedding_text());
        let id = self
            .db
            .with_conn(|conn| storage::insert_snippet(conn, &snippet))?;

        tracing::info!(id, title = %snippet.title, "Added code snippet");
        Ok(id)
    }

    /// Add or replace a function record keyed on its name.
    ///
    /// The prior record with the same name, if any, is removed in the same
    /// transaction; the id is reassigned.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name or signature, or a
    /// storage error on upsert failure.
    pub async fn add_function(&self, mut function: FunctionRecord) -> Result<i64> {
        require("function_name", &function.function_name)?;
        require("signature", &function.signature)?;

        function.embedding = self.embedding_for(&function.embedding_text());
        let id = self
            .db
            .with_transaction(|conn| storage::upsert_function(conn, &function))?;

        tracing::info!(id, name = %function.function_name, "Added function");
        Ok(id)
    }

    /// Add or replace a hook record keyed on its name.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name or type, or a storage
    /// error on upsert failure.
    pub async fn add_hook(&self, mut hook: HookRecord) -> Result<i64> {
        require("hook_name", &hook.hook_name)?;
        require("hook_type", &hook.hook_type)?;

        hook.embedding = self.embedding_for(&hook.embedding_text());
        let id = self
            .db
            .with_transaction(|conn| storage::upsert_hook(conn, &hook))?;

        tracing::info!(id, name = %hook.hook_name, "Added hook");
        Ok(id)
    }

    /// Get a document by id.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if absent.
    pub async fn get_document(&self, id: i64) -> Result<Document> {
        self.db.with_conn(|conn| storage::get_document(conn, id))
    }

    /// Get a code snippet by id.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if absent.
    pub async fn get_code_snippet(&self, id: i64) -> Result<CodeSnippet> {
        self.db.with_conn(|conn| storage::get_snippet(conn, id))
    }

    /// Get a function by id.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if absent.
    pub async fn get_function(&self, id: i64) -> Result<FunctionRecord> {
        self.db.with_conn(|conn| storage::get_function(conn, id))
    }

    /// Get a function by name.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if absent.
    pub async fn get_function_by_name(&self, name: &str) -> Result<FunctionRecord> {
        self.db
            .with_conn(|conn| storage::get_function_by_name(conn, name))
    }

    /// Get a hook by id.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if absent.
    pub async fn get_hook(&self, id: i64) -> Result<HookRecord> {
        self.db.with_conn(|conn| storage::get_hook(conn, id))
    }

    /// Get a hook by name.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if absent.
    pub async fn get_hook_by_name(&self, name: &str) -> Result<HookRecord> {
        self.db
            .with_conn(|conn| storage::get_hook_by_name(conn, name))
    }

    /// Delete a document by id, returning its title.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if absent.
    pub async fn delete_document(&self, id: i64) -> Result<String> {
        self.db.with_conn(|conn| storage::delete_document(conn, id))
    }

    /// Delete a code snippet by id, returning its title.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if absent.
    pub async fn delete_code_snippet(&self, id: i64) -> Result<String> {
        self.db.with_conn(|conn| storage::delete_snippet(conn, id))
    }

    /// Delete a function by id, returning its name.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if absent.
    pub async fn delete_function(&self, id: i64) -> Result<String> {
        self.db.with_conn(|conn| storage::delete_function(conn, id))
    }

    /// Delete a hook by id, returning its name.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if absent.
    pub async fn delete_hook(&self, id: i64) -> Result<String> {
        self.db.with_conn(|conn| storage::delete_hook(conn, id))
    }

    /// Run a merged keyword + semantic search.
    ///
    /// The query is logged to the search history before any pass runs and
    /// the logged row's `result_count` is patched once totals are known.
    /// Keyword hits rank first at relevance 1.0; semantic hits fill the
    /// remaining slots per category, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let search_id = self
            .db
            .with_conn(|conn| storage::insert_search(conn, &request.query))?;

        let options = SearchOptions {
            limit: request.limit.unwrap_or(self.config.default_limit),
            use_semantic: request.use_semantic,
            threshold: self.config.semantic_threshold,
        };

        // Embed the query once for all categories
        let query_embedding = if options.use_semantic {
            self.embedding_for(&request.query)
        } else {
            None
        };

        let categories: Vec<Category> = if request.categories.is_empty() {
            Category::ALL.to_vec()
        } else {
            request.categories.clone()
        };

        let mut response = SearchResponse {
            query: request.query.clone(),
            documents: Vec::new(),
            code_snippets: Vec::new(),
            functions: Vec::new(),
            hooks: Vec::new(),
            total_results: 0,
        };

        self.db.with_conn(|conn| {
            for category in &categories {
                match category {
                    Category::Documents => {
                        response.documents = storage::search_documents(
                            conn,
                            &request.query,
                            query_embedding.as_deref(),
                            &options,
                        )?;
                    }
                    Category::CodeSnippets => {
                        response.code_snippets = storage::search_snippets(
                            conn,
                            &request.query,
                            query_embedding.as_deref(),
                            &options,
                        )?;
                    }
                    Category::Functions => {
                        response.functions = storage::search_functions(
                            conn,
                            &request.query,
                            query_embedding.as_deref(),
                            &options,
                        )?;
                    }
                    Category::Hooks => {
                        response.hooks = storage::search_hooks(
                            conn,
                            &request.query,
                            query_embedding.as_deref(),
                            &options,
                        )?;
                    }
                }
            }
            Ok(())
        })?;

        response.total_results = response.documents.len()
            + response.code_snippets.len()
            + response.functions.len()
            + response.hooks.len();

        self.db.with_conn(|conn| {
            storage::set_result_count(
                conn,
                search_id,
                i64::try_from(response.total_results).unwrap_or(i64::MAX),
            )
        })?;

        tracing::info!(
            query = %request.query,
            total = response.total_results,
            "Search completed"
        );
        Ok(response)
    }

    /// Gather the statistics snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if an aggregation query fails.
    pub async fn statistics(&self) -> Result<Statistics> {
        maintenance::gather_statistics(&self.db)
    }

    /// Back up the store file, deriving a timestamped path when none is
    /// given.
    ///
    /// # Errors
    ///
    /// Returns an error for in-memory stores or when the copy fails; the
    /// connection is reopened either way.
    pub async fn backup(&self, target: Option<PathBuf>) -> Result<PathBuf> {
        maintenance::create_backup(&self.db, target)
    }

    /// Restore from a backup file, returning the safety backup taken of the
    /// pre-restore state.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the backup does not exist, or a storage
    /// or I/O error if a copy fails.
    pub async fn restore(&self, backup_path: &Path) -> Result<PathBuf> {
        maintenance::restore_backup(&self.db, backup_path)
    }

    /// List backups, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error for in-memory stores or when the directory listing
    /// fails.
    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        maintenance::list_backups(&self.db)
    }

    /// Compact and reindex the store file.
    ///
    /// # Errors
    ///
    /// Returns an error if the maintenance statements fail.
    pub async fn optimize(&self) -> Result<OptimizeReport> {
        maintenance::optimize(&self.db)
    }

    /// Export every record and a statistics snapshot to a file tree.
    ///
    /// # Errors
    ///
    /// Returns an error if a database read or file write fails.
    pub async fn export(&self, export_path: &Path) -> Result<()> {
        maintenance::export_tree(&self.db, export_path)
    }

    /// Import a documentation tree.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the path does not exist; per-file
    /// failures are collected in the returned stats.
    pub async fn import(&self, docs_path: &Path) -> Result<ImportStats> {
        maintenance::import_tree(self, docs_path).await
    }

    /// Recompute every stored embedding with the current provider.
    ///
    /// Required after swapping providers; vectors from different providers
    /// are not comparable.
    ///
    /// # Errors
    ///
    /// Refuses with a provider-unavailable error when no provider is
    /// loaded. Per-record failures are collected in the returned stats.
    pub async fn rebuild_embeddings(&self) -> Result<RebuildStats> {
        if !self.provider.is_available() {
            return Err(EmbeddingError::Unavailable.into());
        }

        let mut stats = RebuildStats::default();

        let documents = self.db.with_conn(storage::list_documents)?;
        for document in documents {
            let Some(id) = document.id else { continue };
            let embedding = self.provider.embed(&document.embedding_text());
            match self
                .db
                .with_conn(|conn| storage::update_document_embedding(conn, id, embedding.as_deref()))
            {
                Ok(()) => stats.documents_updated += 1,
                Err(e) => stats.errors.push(format!("document {id}: {e}")),
            }
        }

        let snippets = self.db.with_conn(storage::list_snippets)?;
        for snippet in snippets {
            let Some(id) = snippet.id else { continue };
            let embedding = self.provider.embed(&snippet.embedding_text());
            match self
                .db
                .with_conn(|conn| storage::update_snippet_embedding(conn, id, embedding.as_deref()))
            {
                Ok(()) => stats.code_snippets_updated += 1,
                Err(e) => stats.errors.push(format!("code snippet {id}: {e}")),
            }
        }

        let functions = self.db.with_conn(storage::list_functions)?;
        for function in functions {
            let Some(id) = function.id else { continue };
            let embedding = self.provider.embed(&function.embedding_text());
            match self
                .db
                .with_conn(|conn| storage::update_function_embedding(conn, id, embedding.as_deref()))
            {
                Ok(()) => stats.functions_updated += 1,
                Err(e) => stats.errors.push(format!("function {id}: {e}")),
            }
        }

        let hooks = self.db.with_conn(storage::list_hooks)?;
        for hook in hooks {
            let Some(id) = hook.id else { continue };
            let embedding = self.provider.embed(&hook.embedding_text());
            match self
                .db
                .with_conn(|conn| storage::update_hook_embedding(conn, id, embedding.as_deref()))
            {
                Ok(()) => stats.hooks_updated += 1,
                Err(e) => stats.errors.push(format!("hook {id}: {e}")),
            }
        }

        tracing::info!(
            documents = stats.documents_updated,
            code_snippets = stats.code_snippets_updated,
            functions = stats.functions_updated,
            hooks = stats.hooks_updated,
            errors = stats.errors.len(),
            "Embeddings rebuilt"
        );
        Ok(stats)
    }

    /// Recent searches, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn search_history(&self, limit: usize) -> Result<Vec<SearchEntry>> {
        self.db
            .with_conn(|conn| storage::recent_searches(conn, limit))
    }

    /// Delete the entire search history, returning the removed row count.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion fails.
    pub async fn clear_search_history(&self) -> Result<u64> {
        self.db.with_conn(storage::clear_history)
    }
}

impl std::fmt::Debug for KnowledgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeStore")
            .field("path", &self.db.path())
            .field("provider", &self.provider.name())
            .field("semantic", &self.semantic_search_available())
            .finish_non_exhaustive()
    }
}
