//! `SQLite` storage for the knowledge store.
//!
//! This module provides persistent storage for:
//! - Prose documents
//! - Code snippets
//! - API function and hook reference entries
//! - The append-only search history log
//! plus the keyword + semantic retrieval over all four kinds.

mod connection;
mod documents;
mod functions;
mod history;
mod hooks;
mod models;
mod schema;
mod search;
mod snippets;

pub use connection::Database;
pub use documents::{
    count_documents, delete_document, get_document, insert_document, list_documents,
    update_document_embedding,
};
pub use functions::{
    count_functions, delete_function, get_function, get_function_by_name, list_functions,
    update_function_embedding, upsert_function,
};
pub use history::{clear_history, count_searches, insert_search, recent_searches, set_result_count};
pub use hooks::{
    count_hooks, delete_hook, get_hook, get_hook_by_name, list_hooks, update_hook_embedding,
    upsert_hook,
};
pub use models::{
    CodeSnippet, Document, FunctionRecord, HookRecord, SearchEntry, SearchHit,
};
pub use schema::{migrate, verify_schema, SCHEMA_VERSION};
pub use search::{
    search_documents, search_functions, search_hooks, search_snippets, Category, SearchOptions,
};
pub use snippets::{
    count_snippets, delete_snippet, get_snippet, insert_snippet, list_snippets,
    update_snippet_embedding,
};

/// Initialize storage with migrations.
///
/// # Errors
///
/// Returns an error if database initialization fails.
pub fn init_storage(db: &Database) -> crate::Result<()> {
    db.with_conn(|conn| {
        migrate(conn)?;
        verify_schema(conn)?;

        tracing::info!("Storage initialized, schema version {SCHEMA_VERSION}");
        Ok(())
    })
}
