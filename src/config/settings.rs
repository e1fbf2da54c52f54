//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::PathBuf;

/// Main configuration for the knowledge store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for the `SQLite` database and backups.
    pub data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Minimum cosine similarity for a semantic search hit.
    pub semantic_threshold: f32,

    /// Default per-category result cap for searches.
    pub default_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            semantic_threshold: 0.7,
            default_limit: 10,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if !self.semantic_threshold.is_finite()
            || self.semantic_threshold <= 0.0
            || self.semantic_threshold > 1.0
        {
            return Err(Error::config(format!(
                "semantic_threshold must be in (0, 1], got {}",
                self.semantic_threshold
            )));
        }

        if self.default_limit == 0 {
            return Err(Error::config("default_limit cannot be 0"));
        }

        Ok(())
    }

    /// Get the path to the `SQLite` database file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("knowledge.db")
    }

    /// Get the directory where backups are written.
    #[must_use]
    pub fn backups_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }
}
