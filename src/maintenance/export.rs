//! Export the store as a portable file tree.
//!
//! Layout:
//! - `functions/{name}.json` and `hooks/{name}.json`, one record per file
//! - `documents/{category}/{id}_{slug}.md` with a `.json` sidecar
//! - `code_snippets/{id}_{slug}{ext}` with a `.json` sidecar
//! - `database_stats.json`, a statistics snapshot

use std::path::Path;

use super::stats::gather_statistics;
use crate::error::StorageError;
use crate::storage::{list_documents, list_functions, list_hooks, list_snippets, Database};
use crate::Result;

/// Make a string safe to use as a file name.
///
/// Filesystem-invalid characters become underscores; names longer than 100
/// characters are truncated to 97 plus an ellipsis.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| {
            if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') {
                '_'
            } else {
                c
            }
        })
        .collect();

    if sanitized.chars().count() > 100 {
        sanitized = sanitized.chars().take(97).collect();
        sanitized.push_str("...");
    }

    sanitized
}

/// File extension for a snippet language, defaulting to `.txt`.
pub(crate) fn file_extension(language: &str) -> &'static str {
    match language.to_lowercase().as_str() {
        "php" => ".php",
        "javascript" | "js" => ".js",
        "typescript" | "ts" => ".ts",
        "python" | "py" => ".py",
        "rust" => ".rs",
        "css" => ".css",
        "html" => ".html",
        "sql" => ".sql",
        "bash" | "shell" => ".sh",
        "json" => ".json",
        "xml" => ".xml",
        "yaml" | "yml" => ".yml",
        "markdown" | "md" => ".md",
        _ => ".txt",
    }
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| StorageError::Database(format!("failed to serialize record: {e}")).into())
}

/// Export every record and a statistics snapshot to `export_path`.
///
/// # Errors
///
/// Returns an error if a database read or file write fails.
pub fn export_tree(db: &Database, export_path: &Path) -> Result<()> {
    let functions_dir = export_path.join("functions");
    let hooks_dir = export_path.join("hooks");
    let documents_dir = export_path.join("documents");
    let snippets_dir = export_path.join("code_snippets");

    std::fs::create_dir_all(&functions_dir)?;
    std::fs::create_dir_all(&hooks_dir)?;
    std::fs::create_dir_all(&documents_dir)?;
    std::fs::create_dir_all(&snippets_dir)?;

    let (functions, hooks, documents, snippets) = db.with_conn(|conn| {
        Ok((
            list_functions(conn)?,
            list_hooks(conn)?,
            list_documents(conn)?,
            list_snippets(conn)?,
        ))
    })?;

    for function in &functions {
        let file_name = format!("{}.json", sanitize_filename(&function.function_name));
        std::fs::write(functions_dir.join(file_name), to_pretty_json(function)?)?;
    }

    for hook in &hooks {
        let file_name = format!("{}.json", sanitize_filename(&hook.hook_name));
        std::fs::write(hooks_dir.join(file_name), to_pretty_json(hook)?)?;
    }

    for document in &documents {
        let category_dir = documents_dir.join(sanitize_filename(&document.category));
        std::fs::create_dir_all(&category_dir)?;

        let stem = format!(
            "{}_{}",
            document.id.unwrap_or(0),
            sanitize_filename(&document.title)
        );

        let markdown = format!("# {}\n\n{}", document.title, document.content);
        std::fs::write(category_dir.join(format!("{stem}.md")), markdown)?;
        std::fs::write(
            category_dir.join(format!("{stem}.json")),
            to_pretty_json(document)?,
        )?;
    }

    for snippet in &snippets {
        let stem = format!(
            "{}_{}",
            snippet.id.unwrap_or(0),
            sanitize_filename(&snippet.title)
        );
        let ext = file_extension(&snippet.language);

        std::fs::write(snippets_dir.join(format!("{stem}{ext}")), &snippet.code)?;
        std::fs::write(
            snippets_dir.join(format!("{stem}.json")),
            to_pretty_json(snippet)?,
        )?;
    }

    let stats = gather_statistics(db)?;
    std::fs::write(
        export_path.join("database_stats.json"),
        to_pretty_json(&stats)?,
    )?;

    tracing::info!(
        path = %export_path.display(),
        functions = functions.len(),
        hooks = hooks.len(),
        documents = documents.len(),
        snippets = snippets.len(),
        "Store exported"
    );

    Ok(())
}
