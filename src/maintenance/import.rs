//! Import a documentation tree into the store.
//!
//! Consumes three optional subdirectories of the given path:
//! - `functions/*.json` — one function record per file
//! - `hooks/*.json` — one hook record per file
//! - `content/**/*.md` — markdown documents; the first `# ` heading is the
//!   title (falling back to the file stem) and the first path segment under
//!   `content/` is the category (defaulting to "general")
//!
//! Per-file failures are collected rather than aborting the walk.

use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::StorageError;
use crate::storage::{Document, FunctionRecord, HookRecord};
use crate::store::KnowledgeStore;
use crate::Result;

/// Outcome of an import walk.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportStats {
    /// Function records added.
    pub functions_added: usize,

    /// Hook records added.
    pub hooks_added: usize,

    /// Documents added.
    pub documents_added: usize,

    /// Per-file failures, one message each.
    pub errors: Vec<String>,
}

/// JSON files directly inside a directory, sorted by name.
fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Markdown files anywhere under a directory, sorted by path.
fn markdown_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| {
            entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "md")
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Title from the first `# ` heading, else the file stem.
fn markdown_title(content: &str, path: &Path) -> String {
    content
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("# "))
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map_or_else(
            || {
                path.file_stem()
                    .map_or_else(String::new, |stem| stem.to_string_lossy().to_string())
            },
            ToString::to_string,
        )
}

/// Category from the first path segment under the content root.
fn category_for(path: &Path, content_dir: &Path) -> String {
    path.strip_prefix(content_dir)
        .unwrap_or(path)
        .parent()
        .and_then(|parent| parent.components().next())
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .filter(|segment| !segment.is_empty())
        .unwrap_or_else(|| "general".to_string())
}

/// Walk a documentation tree and add everything it contains.
///
/// # Errors
///
/// Returns a not-found error if `docs_path` does not exist, or an I/O error
/// if a directory listing fails. Individual file failures land in
/// [`ImportStats::errors`] instead.
pub async fn import_tree(store: &KnowledgeStore, docs_path: &Path) -> Result<ImportStats> {
    if !docs_path.exists() {
        return Err(
            StorageError::not_found("import path", docs_path.display().to_string()).into(),
        );
    }

    let mut stats = ImportStats::default();

    let functions_dir = docs_path.join("functions");
    if functions_dir.exists() {
        for path in json_files(&functions_dir)? {
            match import_function(store, &path).await {
                Ok(()) => stats.functions_added += 1,
                Err(e) => {
                    let message = format!("function {}: {e}", path.display());
                    tracing::warn!("{message}");
                    stats.errors.push(message);
                }
            }
        }
    }

    let hooks_dir = docs_path.join("hooks");
    if hooks_dir.exists() {
        for path in json_files(&hooks_dir)? {
            match import_hook(store, &path).await {
                Ok(()) => stats.hooks_added += 1,
                Err(e) => {
                    let message = format!("hook {}: {e}", path.display());
                    tracing::warn!("{message}");
                    stats.errors.push(message);
                }
            }
        }
    }

    let content_dir = docs_path.join("content");
    if content_dir.exists() {
        for path in markdown_files(&content_dir) {
            match import_markdown(store, &path, &content_dir).await {
                Ok(()) => stats.documents_added += 1,
                Err(e) => {
                    let message = format!("document {}: {e}", path.display());
                    tracing::warn!("{message}");
                    stats.errors.push(message);
                }
            }
        }
    }

    tracing::info!(
        functions = stats.functions_added,
        hooks = stats.hooks_added,
        documents = stats.documents_added,
        errors = stats.errors.len(),
        "Documentation import completed"
    );

    Ok(stats)
}

async fn import_function(store: &KnowledgeStore, path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)?;
    let function: FunctionRecord = serde_json::from_str(&raw)
        .map_err(|e| crate::Error::validation(format!("invalid function JSON: {e}")))?;
    store.add_function(function).await?;
    Ok(())
}

async fn import_hook(store: &KnowledgeStore, path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)?;
    let hook: HookRecord = serde_json::from_str(&raw)
        .map_err(|e| crate::Error::validation(format!("invalid hook JSON: {e}")))?;
    store.add_hook(hook).await?;
    Ok(())
}

async fn import_markdown(store: &KnowledgeStore, path: &Path, content_dir: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    let title = markdown_title(&content, path);
    let category = category_for(path, content_dir);

    store
        .add_document(
            Document::new(title, content, category).with_source(path.display().to_string()),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::NullEmbedding;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_store() -> KnowledgeStore {
        KnowledgeStore::open_in_memory(Arc::new(NullEmbedding::new())).unwrap()
    }

    #[test]
    fn test_markdown_title_from_heading() {
        let path = Path::new("content/guide/intro.md");
        assert_eq!(markdown_title("# Getting Started\n\nBody", path), "Getting Started");
        assert_eq!(markdown_title("No heading here", path), "intro");
        assert_eq!(markdown_title("#NotAHeading", path), "intro");
    }

    #[test]
    fn test_category_from_path() {
        let content = Path::new("/docs/content");
        assert_eq!(
            category_for(Path::new("/docs/content/hooks-guide/intro.md"), content),
            "hooks-guide"
        );
        assert_eq!(
            category_for(Path::new("/docs/content/a/b/deep.md"), content),
            "a"
        );
        assert_eq!(
            category_for(Path::new("/docs/content/top.md"), content),
            "general"
        );
    }

    #[tokio::test]
    async fn test_import_missing_path() {
        let store = test_store();
        let err = import_tree(&store, Path::new("/definitely/not/here"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_import_full_tree() {
        let store = test_store();
        let tmp = TempDir::new().unwrap();

        let functions = tmp.path().join("functions");
        std::fs::create_dir_all(&functions).unwrap();
        std::fs::write(
            functions.join("get_option.json"),
            r#"{"function_name": "get_option", "signature": "get_option($option)"}"#,
        )
        .unwrap();

        let hooks = tmp.path().join("hooks");
        std::fs::create_dir_all(&hooks).unwrap();
        std::fs::write(
            hooks.join("init.json"),
            r#"{"hook_name": "init", "hook_type": "action"}"#,
        )
        .unwrap();

        let content = tmp.path().join("content").join("guide");
        std::fs::create_dir_all(&content).unwrap();
        std::fs::write(content.join("caching.md"), "# Caching Basics\n\nUse transients.").unwrap();

        let stats = import_tree(&store, tmp.path()).await.unwrap();
        assert_eq!(stats.functions_added, 1);
        assert_eq!(stats.hooks_added, 1);
        assert_eq!(stats.documents_added, 1);
        assert!(stats.errors.is_empty());

        let function = store.get_function_by_name("get_option").await.unwrap();
        assert_eq!(function.signature, "get_option($option)");

        let doc = store.get_document(1).await.unwrap();
        assert_eq!(doc.title, "Caching Basics");
        assert_eq!(doc.category, "guide");
        assert!(doc.source.is_some());
    }

    #[tokio::test]
    async fn test_import_collects_errors_and_continues() {
        let store = test_store();
        let tmp = TempDir::new().unwrap();

        let functions = tmp.path().join("functions");
        std::fs::create_dir_all(&functions).unwrap();
        std::fs::write(functions.join("bad.json"), "{ this is not json").unwrap();
        std::fs::write(
            functions.join("good.json"),
            r#"{"function_name": "add_filter", "signature": "add_filter($tag, $cb)"}"#,
        )
        .unwrap();

        let stats = import_tree(&store, tmp.path()).await.unwrap();
        assert_eq!(stats.functions_added, 1);
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0].contains("bad.json"));
    }

    #[tokio::test]
    async fn test_import_empty_tree() {
        let store = test_store();
        let tmp = TempDir::new().unwrap();

        let stats = import_tree(&store, tmp.path()).await.unwrap();
        assert_eq!(stats.functions_added, 0);
        assert_eq!(stats.hooks_added, 0);
        assert_eq!(stats.documents_added, 0);
        assert!(stats.errors.is_empty());
    }
}
