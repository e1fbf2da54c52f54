//! Backup, restore and file-level maintenance.
//!
//! Backups are plain copies of the store file, written while the live
//! connection is closed. Restore takes a fresh safety backup of the current
//! state first, so a restore is itself undoable.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::StorageError;
use crate::storage::Database;
use crate::Result;

/// Filename prefix every backup carries.
pub const BACKUP_PREFIX: &str = "knowledge_backup_";

/// One backup file on disk.
#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    /// File name within the backups directory.
    pub filename: String,

    /// Full path to the backup file.
    pub path: PathBuf,

    /// Size in bytes.
    pub size_bytes: u64,

    /// Size in megabytes, rounded to two decimals.
    pub size_mb: f64,

    /// Modification time, formatted `YYYY-MM-DD HH:MM:SS` local time.
    pub modified: String,
}

/// Result of an optimize pass.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizeReport {
    /// Wall-clock seconds spent, rounded to two decimals.
    pub elapsed_secs: f64,

    /// Store file size before.
    pub size_before_bytes: u64,

    /// Store file size after.
    pub size_after_bytes: u64,

    /// Bytes reclaimed (negative if the file grew).
    pub size_reduction_bytes: i64,
}

/// The backups directory sibling to the store file.
fn backups_dir(db: &Database) -> Result<PathBuf> {
    let db_path = db.file_path().ok_or_else(|| {
        StorageError::Database("backups require a file-backed store".to_string())
    })?;
    let parent = db_path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    Ok(parent.join("backups"))
}

/// Create a backup of the store file.
///
/// With no target given, the backup lands in the `backups` directory next
/// to the store file, named with a local-time `YYYYMMDD_HHMMSS` stamp. The
/// connection is closed for the copy and reopened before returning, even on
/// failure.
///
/// # Errors
///
/// Returns an error for in-memory stores or when the copy fails.
pub fn create_backup(db: &Database, target: Option<PathBuf>) -> Result<PathBuf> {
    let backup_path = match target {
        Some(path) => path,
        None => {
            let dir = backups_dir(db)?;
            let timestamp = Local::now().format("%Y%m%d_%H%M%S");
            // Same-second backups must not overwrite each other; the
            // restore safety backup often lands in the same second as the
            // backup being restored.
            let mut path = dir.join(format!("{BACKUP_PREFIX}{timestamp}.db"));
            let mut counter = 1;
            while path.exists() {
                path = dir.join(format!("{BACKUP_PREFIX}{timestamp}_{counter}.db"));
                counter += 1;
            }
            path
        }
    };

    if let Some(parent) = backup_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    db.with_file_access(|live| {
        std::fs::copy(live, &backup_path)?;
        Ok(())
    })?;

    tracing::info!(backup = %backup_path.display(), "Store backed up");
    Ok(backup_path)
}

/// Restore the store from a backup file.
///
/// Takes a fresh backup of the current state first and returns its path, so
/// the restore can be undone.
///
/// # Errors
///
/// Returns a not-found error if `backup_path` does not exist, and a storage
/// or I/O error if either copy fails. The connection is reopened either way.
pub fn restore_backup(db: &Database, backup_path: &Path) -> Result<PathBuf> {
    if !backup_path.exists() {
        return Err(StorageError::not_found("backup", backup_path.display().to_string()).into());
    }

    let previous = create_backup(db, None)?;

    db.with_file_access(|live| {
        std::fs::copy(backup_path, live)?;
        Ok(())
    })?;

    tracing::info!(
        restored_from = %backup_path.display(),
        previous_backup = %previous.display(),
        "Store restored"
    );
    Ok(previous)
}

/// List backups in the backups directory, newest first.
///
/// Only files matching the backup naming pattern are reported. A missing
/// backups directory yields an empty list.
///
/// # Errors
///
/// Returns an error for in-memory stores or when the directory cannot be
/// read.
pub fn list_backups(db: &Database) -> Result<Vec<BackupInfo>> {
    let dir = backups_dir(db)?;
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut backups: Vec<(SystemTime, BackupInfo)> = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let filename = entry.file_name().to_string_lossy().to_string();
        if !filename.starts_with(BACKUP_PREFIX) || !filename.ends_with(".db") {
            continue;
        }

        let metadata = entry.metadata()?;
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let size_bytes = metadata.len();
        #[allow(clippy::cast_precision_loss)]
        let size_mb = (size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;

        backups.push((
            modified,
            BackupInfo {
                filename,
                path: entry.path(),
                size_bytes,
                size_mb,
                modified: DateTime::<Local>::from(modified)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
            },
        ));
    }

    // Newest first; timestamped names break same-second ties
    backups.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.filename.cmp(&a.1.filename)));

    tracing::debug!(count = backups.len(), "Listed backups");
    Ok(backups.into_iter().map(|(_, info)| info).collect())
}

/// Compact and reindex the store file.
///
/// # Errors
///
/// Returns an error if the maintenance statements fail.
pub fn optimize(db: &Database) -> Result<OptimizeReport> {
    let started = std::time::Instant::now();
    let size_before_bytes = db.file_size();

    db.with_conn(|conn| {
        conn.execute_batch("ANALYZE; VACUUM; REINDEX;")
            .map_err(|e| StorageError::Database(format!("optimize failed: {e}")).into())
    })?;

    let size_after_bytes = db.file_size();
    let elapsed_secs = (started.elapsed().as_secs_f64() * 100.0).round() / 100.0;
    let size_reduction_bytes =
        i64::try_from(size_before_bytes).unwrap_or(i64::MAX) - i64::try_from(size_after_bytes).unwrap_or(i64::MAX);

    tracing::info!(
        elapsed_secs,
        size_before_bytes,
        size_after_bytes,
        "Store optimized"
    );

    Ok(OptimizeReport {
        elapsed_secs,
        size_before_bytes,
        size_after_bytes,
        size_reduction_bytes,
    })
}
