//! ragstore - embedded knowledge store with keyword and semantic retrieval.
//!
//! CLI entry point exercising the store API.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use ragstore::embeddings::{EmbeddingProvider, HashEmbedding, NullEmbedding};
use ragstore::storage::Category;
use ragstore::{Config, KnowledgeStore, Result, SearchRequest};

/// ragstore - embedded knowledge store with keyword and semantic retrieval
#[derive(Parser, Debug)]
#[command(name = "ragstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory for the `SQLite` database and backups
    #[arg(short, long, env = "RAGSTORE_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RAGSTORE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "RAGSTORE_LOG_JSON")]
    log_json: bool,

    /// Disable the embedding provider; search runs keyword-only
    #[arg(long, env = "RAGSTORE_NO_SEMANTIC")]
    no_semantic: bool,

    /// Minimum cosine similarity for a semantic hit
    #[arg(long, env = "RAGSTORE_SEMANTIC_THRESHOLD", default_value = "0.7")]
    semantic_threshold: f32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the statistics snapshot
    Stats,

    /// Search the store
    Search {
        /// Query text
        query: String,

        /// Per-category result cap
        #[arg(short, long)]
        limit: Option<usize>,

        /// Categories to search (documents, code_snippets, functions, hooks)
        #[arg(short, long, value_delimiter = ',')]
        categories: Vec<String>,

        /// Skip the semantic fallback for this query
        #[arg(long)]
        keyword_only: bool,
    },

    /// Import a documentation tree (functions/, hooks/, content/)
    Import {
        /// Root of the documentation tree
        path: PathBuf,
    },

    /// Export all records and a stats snapshot to a file tree
    Export {
        /// Target directory
        path: PathBuf,
    },

    /// Back up the store file
    Backup {
        /// Explicit backup path; defaults to a timestamped file under backups/
        #[arg(long)]
        target: Option<PathBuf>,
    },

    /// Restore the store from a backup file
    Restore {
        /// Backup file to restore
        path: PathBuf,
    },

    /// List available backups, newest first
    Backups,

    /// Recompute every stored embedding with the current provider
    Rebuild,

    /// Show recent searches
    History {
        /// Maximum entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Delete the entire search history
    ClearHistory,

    /// Compact and reindex the store file
    Optimize,
}

/// Initialize tracing with the given configuration.
fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{
        filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        let json_layer = fmt::layer().json().with_target(true);
        Registry::default().with(env_filter).with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer().with_target(false);
        Registry::default().with(env_filter).with(fmt_layer).init();
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| ragstore::Error::internal(format!("failed to render output: {e}")))?;
    println!("{rendered}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json);

    let config = Config {
        data_dir: cli.data_dir,
        log_level: cli.log_level,
        semantic_threshold: cli.semantic_threshold,
        ..Config::default()
    };

    let provider: Arc<dyn EmbeddingProvider> = if cli.no_semantic {
        Arc::new(NullEmbedding::new())
    } else {
        Arc::new(HashEmbedding::new())
    };

    let store = KnowledgeStore::open(config, provider)?;

    match cli.command {
        Command::Stats => {
            let stats = store.statistics().await?;
            print_json(&stats)?;
        }
        Command::Search {
            query,
            limit,
            categories,
            keyword_only,
        } => {
            let categories: Vec<Category> = categories
                .iter()
                .map(|c| c.parse())
                .collect::<Result<_>>()?;

            let mut request = SearchRequest::new(query).with_categories(categories);
            if let Some(limit) = limit {
                request = request.with_limit(limit);
            }
            if keyword_only {
                request = request.keyword_only();
            }

            let response = store.search(request).await?;
            print_json(&response)?;
        }
        Command::Import { path } => {
            let stats = store.import(&path).await?;
            print_json(&stats)?;
        }
        Command::Export { path } => {
            store.export(&path).await?;
            println!("Exported to {}", path.display());
        }
        Command::Backup { target } => {
            let backup_path = store.backup(target).await?;
            println!("Backed up to {}", backup_path.display());
        }
        Command::Restore { path } => {
            let previous = store.restore(&path).await?;
            println!(
                "Restored from {} (previous state saved to {})",
                path.display(),
                previous.display()
            );
        }
        Command::Backups => {
            let backups = store.list_backups().await?;
            print_json(&backups)?;
        }
        Command::Rebuild => {
            let stats = store.rebuild_embeddings().await?;
            print_json(&stats)?;
        }
        Command::History { limit } => {
            let history = store.search_history(limit).await?;
            print_json(&history)?;
        }
        Command::ClearHistory => {
            let deleted = store.clear_search_history().await?;
            println!("Cleared {deleted} search history entries");
        }
        Command::Optimize => {
            let report = store.optimize().await?;
            print_json(&report)?;
        }
    }

    Ok(())
}
