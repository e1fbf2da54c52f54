//! End-to-end tests for the knowledge store.
//!
//! These exercise the public facade against file-backed stores: round
//! trips, search merging, history accounting, backup/restore and the
//! degraded keyword-only mode.

use std::collections::BTreeMap;
use std::sync::Arc;

use ragstore::embeddings::{EmbeddingProvider, HashEmbedding, NullEmbedding};
use ragstore::storage::{Category, CodeSnippet, Document, FunctionRecord, HookRecord};
use ragstore::{Config, KnowledgeStore, SearchRequest};
use tempfile::TempDir;

fn file_store(tmp: &TempDir) -> KnowledgeStore {
    let config = Config {
        data_dir: tmp.path().to_path_buf(),
        ..Config::default()
    };
    KnowledgeStore::open(config, Arc::new(HashEmbedding::new())).unwrap()
}

#[tokio::test]
async fn document_roundtrip() {
    let store = KnowledgeStore::open_in_memory(Arc::new(HashEmbedding::new())).unwrap();

    let id = store
        .add_document(
            Document::new("Enqueue Scripts Guide", "Use wp_enqueue_script.", "guide")
                .with_tags(vec!["scripts".to_string(), "assets".to_string()])
                .with_source("docs/enqueue.md"),
        )
        .await
        .unwrap();

    let doc = store.get_document(id).await.unwrap();
    assert_eq!(doc.title, "Enqueue Scripts Guide");
    assert_eq!(doc.content, "Use wp_enqueue_script.");
    assert_eq!(doc.category, "guide");
    assert_eq!(doc.tags, vec!["scripts", "assets"]);
    assert_eq!(doc.source, Some("docs/enqueue.md".to_string()));
}

#[tokio::test]
async fn function_roundtrip_with_parameters() {
    let store = KnowledgeStore::open_in_memory(Arc::new(HashEmbedding::new())).unwrap();

    let mut parameters = BTreeMap::new();
    parameters.insert("$option".to_string(), "Option name".to_string());
    parameters.insert("$default".to_string(), "Fallback value".to_string());

    let id = store
        .add_function(
            FunctionRecord::new("get_option", "get_option($option, $default)")
                .with_description("Retrieves an option")
                .with_parameters(parameters.clone())
                .with_return_value("mixed")
                .with_example("get_option('siteurl');")
                .with_version_added("1.5.0")
                .with_source_file("wp-includes/option.php"),
        )
        .await
        .unwrap();

    let func = store.get_function(id).await.unwrap();
    assert_eq!(func.parameters, parameters);
    assert_eq!(func.return_value, Some("mixed".to_string()));
    assert!(!func.deprecated);
}

#[tokio::test]
async fn hook_overwrite_by_name() {
    let store = KnowledgeStore::open_in_memory(Arc::new(HashEmbedding::new())).unwrap();

    let first = store
        .add_hook(HookRecord::new("save_post", "action"))
        .await
        .unwrap();
    let second = store
        .add_hook(HookRecord::new("save_post", "action").with_description("Fires on post save"))
        .await
        .unwrap();

    assert_ne!(first, second);

    let hook = store.get_hook_by_name("save_post").await.unwrap();
    assert_eq!(hook.id, Some(second));
    assert_eq!(hook.description, Some("Fires on post save".to_string()));

    // The deleted name comes back for confirmation
    let name = store.delete_hook(second).await.unwrap();
    assert_eq!(name, "save_post");
    assert!(store
        .get_hook_by_name("save_post")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn keyword_search_finds_exact_substring() {
    let store = KnowledgeStore::open_in_memory(Arc::new(HashEmbedding::new())).unwrap();

    store
        .add_document(Document::new(
            "Enqueue Scripts Guide",
            "How to enqueue scripts and styles.",
            "guide",
        ))
        .await
        .unwrap();

    let response = store.search(SearchRequest::new("Enqueue")).await.unwrap();
    assert_eq!(response.documents.len(), 1);
    assert_eq!(response.documents[0].record.title, "Enqueue Scripts Guide");
    assert!((response.documents[0].relevance - 1.0).abs() < f32::EPSILON);
}

#[tokio::test]
async fn semantic_hit_requires_semantic_mode() {
    let store = KnowledgeStore::open_in_memory(Arc::new(HashEmbedding::new())).unwrap();

    // High token overlap with the query, no contiguous substring match
    store
        .add_document(Document::new(
            "Transient Expiry",
            "caching transients expiry",
            "guide",
        ))
        .await
        .unwrap();

    let query = "transients caching expiry";

    let semantic = store.search(SearchRequest::new(query)).await.unwrap();
    assert_eq!(semantic.documents.len(), 1);
    assert!(semantic.documents[0].relevance > 0.7);
    assert!(semantic.documents[0].relevance < 1.0);

    let keyword_only = store
        .search(SearchRequest::new(query).keyword_only())
        .await
        .unwrap();
    assert!(keyword_only.documents.is_empty());
    assert_eq!(keyword_only.total_results, 0);
}

#[tokio::test]
async fn keyword_hits_never_duplicated_by_semantic_pass() {
    let store = KnowledgeStore::open_in_memory(Arc::new(HashEmbedding::new())).unwrap();

    store
        .add_document(Document::new(
            "caching transients",
            "caching transients guide",
            "guide",
        ))
        .await
        .unwrap();

    let response = store
        .search(SearchRequest::new("caching transients"))
        .await
        .unwrap();

    assert_eq!(response.documents.len(), 1);
    assert!((response.documents[0].relevance - 1.0).abs() < f32::EPSILON);
}

#[tokio::test]
async fn limit_enforced_per_category() {
    let store = KnowledgeStore::open_in_memory(Arc::new(HashEmbedding::new())).unwrap();

    for i in 0..6 {
        store
            .add_document(Document::new(
                format!("caching doc {i}"),
                "all about caching",
                "guide",
            ))
            .await
            .unwrap();
    }
    for i in 0..6 {
        // Semantically close to the query, no "caching" substring as a
        // contiguous match is fine here; these may or may not clear the
        // threshold but can never push past the limit
        store
            .add_document(Document::new(
                format!("transient notes {i}"),
                "transients cache expiry rules",
                "guide",
            ))
            .await
            .unwrap();
    }

    let response = store
        .search(SearchRequest::new("caching").with_limit(3))
        .await
        .unwrap();

    assert_eq!(response.documents.len(), 3);
    assert_eq!(response.total_results, 3);
}

#[tokio::test]
async fn search_history_records_query_and_total() {
    let store = KnowledgeStore::open_in_memory(Arc::new(HashEmbedding::new())).unwrap();

    store
        .add_document(Document::new("Nonce Guide", "Verifying a nonce.", "security"))
        .await
        .unwrap();
    store
        .add_document(Document::new("Form Nonces", "Add a nonce to forms.", "security"))
        .await
        .unwrap();
    store
        .add_code_snippet(
            CodeSnippet::new("Nonce Field", "wp_nonce_field('save');", "php")
                .with_description("Print a nonce field"),
        )
        .await
        .unwrap();

    let response = store
        .search(SearchRequest::new("nonce").with_limit(5))
        .await
        .unwrap();
    assert_eq!(response.documents.len(), 2);
    assert_eq!(response.code_snippets.len(), 1);
    assert_eq!(response.total_results, 3);

    let history = store.search_history(1).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].query, "nonce");
    assert_eq!(history[0].result_count, 3);
}

#[tokio::test]
async fn backup_then_restore_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let store = file_store(&tmp);

    store
        .add_document(Document::new("Keep Me", "original content", "guide"))
        .await
        .unwrap();
    store
        .add_function(FunctionRecord::new("get_option", "get_option($o)"))
        .await
        .unwrap();

    let backup = store.backup(None).await.unwrap();
    assert!(backup.exists());

    // Mutate after the backup
    store
        .add_document(Document::new("Drop Me", "added later", "guide"))
        .await
        .unwrap();
    store
        .add_hook(HookRecord::new("init", "action"))
        .await
        .unwrap();

    store.restore(&backup).await.unwrap();

    // Content matches the state at backup time
    let stats = store.statistics().await.unwrap();
    assert_eq!(stats.document_count, 1);
    assert_eq!(stats.function_count, 1);
    assert_eq!(stats.hook_count, 0);

    let doc = store.get_document(1).await.unwrap();
    assert_eq!(doc.title, "Keep Me");

    // The store stays usable (connection reopened)
    store
        .add_document(Document::new("After Restore", "still writable", "guide"))
        .await
        .unwrap();

    // Both the explicit backup and the pre-restore safety backup are listed
    let backups = store.list_backups().await.unwrap();
    assert!(backups.len() >= 2);
}

#[tokio::test]
async fn degraded_mode_without_provider() {
    let tmp = TempDir::new().unwrap();
    let config = Config {
        data_dir: tmp.path().to_path_buf(),
        ..Config::default()
    };
    let store = KnowledgeStore::open(config, Arc::new(NullEmbedding::new())).unwrap();

    assert!(!store.semantic_search_available());

    // Adds and keyword search still work
    store
        .add_document(Document::new("Caching Basics", "Use transients.", "guide"))
        .await
        .unwrap();
    store
        .add_code_snippet(CodeSnippet::new("Snip", "code();", "php"))
        .await
        .unwrap();
    store
        .add_function(FunctionRecord::new("f", "f()"))
        .await
        .unwrap();
    store.add_hook(HookRecord::new("h", "filter")).await.unwrap();

    let response = store.search(SearchRequest::new("Caching")).await.unwrap();
    assert_eq!(response.total_results, 1);

    // Rebuild refuses
    let err = store.rebuild_embeddings().await.unwrap_err();
    assert!(err.to_string().contains("not available"));
}

#[tokio::test]
async fn end_to_end_caching_scenario() {
    let store = KnowledgeStore::open_in_memory(Arc::new(HashEmbedding::new())).unwrap();

    store
        .add_document(Document::new(
            "Caching Basics",
            "Use transients for caching.",
            "guide",
        ))
        .await
        .unwrap();
    store
        .add_code_snippet(
            CodeSnippet::new("Transient Example", "set_transient('key', $value);", "php")
                .with_description("Example of caching with transients"),
        )
        .await
        .unwrap();

    let response = store.search(SearchRequest::new("caching")).await.unwrap();

    assert_eq!(response.documents.len(), 1);
    assert_eq!(response.documents[0].record.title, "Caching Basics");
    // "caching" substring-matches the snippet description
    assert_eq!(response.code_snippets.len(), 1);
    assert_eq!(
        response.total_results,
        response.documents.len() + response.code_snippets.len()
    );
}

#[tokio::test]
async fn export_import_cycle() {
    let tmp = TempDir::new().unwrap();
    let store = file_store(&tmp);

    store
        .add_document(Document::new("Caching Basics", "Use transients.", "guide"))
        .await
        .unwrap();
    store
        .add_code_snippet(CodeSnippet::new("Transient Example", "set_transient();", "php"))
        .await
        .unwrap();
    store
        .add_function(FunctionRecord::new("get_option", "get_option($o)"))
        .await
        .unwrap();
    store
        .add_hook(HookRecord::new("init", "action"))
        .await
        .unwrap();

    let export_dir = tmp.path().join("export");
    store.export(&export_dir).await.unwrap();

    assert!(export_dir.join("functions").join("get_option.json").exists());
    assert!(export_dir.join("hooks").join("init.json").exists());
    assert!(export_dir.join("database_stats.json").exists());

    // A second store can re-ingest the exported functions and hooks
    let tmp2 = TempDir::new().unwrap();
    let other = file_store(&tmp2);
    let stats = other.import(&export_dir).await.unwrap();
    assert_eq!(stats.functions_added, 1);
    assert_eq!(stats.hooks_added, 1);
    assert!(stats.errors.is_empty());

    let func = other.get_function_by_name("get_option").await.unwrap();
    assert_eq!(func.signature, "get_option($o)");
}

#[tokio::test]
async fn rebuild_embeddings_enables_semantic_search() {
    let tmp = TempDir::new().unwrap();

    // Records written without a provider carry no embedding
    let config = Config {
        data_dir: tmp.path().to_path_buf(),
        ..Config::default()
    };
    let store = KnowledgeStore::open(config.clone(), Arc::new(NullEmbedding::new())).unwrap();
    store
        .add_document(Document::new(
            "Transient Expiry",
            "caching transients expiry",
            "guide",
        ))
        .await
        .unwrap();
    drop(store);

    // Reopen with a provider; semantic search finds nothing until rebuild
    let store = KnowledgeStore::open(config, Arc::new(HashEmbedding::new())).unwrap();
    let before = store
        .search(SearchRequest::new("transients caching expiry"))
        .await
        .unwrap();
    assert!(before.documents.is_empty());

    let stats = store.rebuild_embeddings().await.unwrap();
    assert_eq!(stats.documents_updated, 1);

    let after = store
        .search(SearchRequest::new("transients caching expiry"))
        .await
        .unwrap();
    assert_eq!(after.documents.len(), 1);
    assert!(after.documents[0].relevance > 0.7);
}

#[tokio::test]
async fn category_filter_limits_scope() {
    let store = KnowledgeStore::open_in_memory(Arc::new(HashEmbedding::new())).unwrap();

    store
        .add_document(Document::new("caching doc", "caching", "guide"))
        .await
        .unwrap();
    store
        .add_function(FunctionRecord::new("wp_cache_get", "wp_cache_get($key)"))
        .await
        .unwrap();

    let response = store
        .search(SearchRequest::new("cache").with_categories(vec![Category::Functions]))
        .await
        .unwrap();

    assert!(response.documents.is_empty());
    assert_eq!(response.functions.len(), 1);
    assert_eq!(response.total_results, 1);
}

#[tokio::test]
async fn statistics_reflect_store_contents() {
    let tmp = TempDir::new().unwrap();
    let store = file_store(&tmp);

    store
        .add_document(Document::new("A", "a", "guide"))
        .await
        .unwrap();
    store
        .add_document(Document::new("B", "b", "tutorial"))
        .await
        .unwrap();
    store
        .add_code_snippet(CodeSnippet::new("S", "s();", "php"))
        .await
        .unwrap();
    store.search(SearchRequest::new("guide")).await.unwrap();
    store.search(SearchRequest::new("guide")).await.unwrap();

    let stats = store.statistics().await.unwrap();
    assert_eq!(stats.document_count, 2);
    assert_eq!(stats.code_snippet_count, 1);
    assert_eq!(stats.search_count, 2);
    assert_eq!(stats.document_categories.get("guide"), Some(&1));
    assert_eq!(stats.code_snippet_languages.get("php"), Some(&1));
    assert!(stats.database_size_bytes > 0);
    assert_eq!(stats.top_searches[0].query, "guide");
    assert_eq!(stats.top_searches[0].count, 2);
    assert_eq!(stats.recent_additions.len(), 3);
}

#[test]
fn hash_embedding_is_stable_across_instances() {
    // Stored vectors must stay comparable between process runs
    let a = HashEmbedding::new().embed("stable embedding input").unwrap();
    let b = HashEmbedding::new().embed("stable embedding input").unwrap();
    assert_eq!(a, b);
}
