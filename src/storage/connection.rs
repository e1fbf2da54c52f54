//! `SQLite` database connection management.
//!
//! Provides a connection wrapper with proper configuration for:
//! - WAL mode for concurrent reads
//! - Exclusive access via `parking_lot::Mutex`
//! - A close-copy-reopen window for file-level operations (backup/restore)

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::StorageError;
use crate::Result;

/// Where the database lives.
#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

struct Inner {
    conn: Option<Connection>,
    location: Location,
}

/// Database connection wrapper.
///
/// Wraps a `SQLite` connection with proper configuration and locking.
/// Clone is cheap - it just clones the Arc. The connection is always live
/// except inside [`Database::with_file_access`], which holds the lock for
/// the whole closed window so other callers block instead of observing a
/// closed store.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Mutex<Inner>>,
}

impl Database {
    /// Open a database at the given path.
    ///
    /// Creates the database file and parent directories if they don't exist.
    /// Configures WAL mode and performance settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or configured.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = open_file_connection(path)?;
        configure(&conn)?;

        tracing::debug!(path = %path.display(), "Database opened");

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                conn: Some(conn),
                location: Location::File(path.to_path_buf()),
            })),
        })
    }

    /// Open an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            StorageError::Database(format!("failed to open in-memory database: {e}"))
        })?;
        configure(&conn)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                conn: Some(conn),
                location: Location::Memory,
            })),
        })
    }

    /// Execute a function with exclusive database access.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or the function fails.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let inner = self.inner.lock();
        let conn = inner.conn.as_ref().ok_or(StorageError::Closed)?;
        f(conn)
    }

    /// Execute a function that may modify the database.
    ///
    /// Wraps the operation in an immediate transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails or if the function fails.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let inner = self.inner.lock();
        let conn = inner.conn.as_ref().ok_or(StorageError::Closed)?;

        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| StorageError::Database(format!("failed to begin transaction: {e}")))?;

        match f(conn) {
            Ok(result) => {
                conn.execute_batch("COMMIT")
                    .map_err(|e| StorageError::Database(format!("failed to commit: {e}")))?;
                Ok(result)
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Run a file-level operation with the connection closed.
    ///
    /// Closes the live connection, invokes `f` with the database file path,
    /// then reopens unconditionally, so the store re-enters the Open state
    /// whether or not `f` succeeded. The lock is held throughout; concurrent
    /// operations block for the duration.
    ///
    /// # Errors
    ///
    /// Returns an error for in-memory stores, when `f` fails, or when the
    /// connection cannot be reopened.
    pub fn with_file_access<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Path) -> Result<T>,
    {
        let mut inner = self.inner.lock();
        let path = match &inner.location {
            Location::File(path) => path.clone(),
            Location::Memory => {
                return Err(StorageError::Database(
                    "file operations require a file-backed store".to_string(),
                )
                .into())
            }
        };

        // Dropping the connection checkpoints the WAL and releases the file.
        inner.conn = None;
        let result = f(&path);

        let conn = open_file_connection(&path)?;
        configure(&conn)?;
        inner.conn = Some(conn);

        tracing::debug!(path = %path.display(), "Connection reopened after file access");
        result
    }

    /// Get a displayable database path.
    #[must_use]
    pub fn path(&self) -> String {
        match &self.inner.lock().location {
            Location::File(path) => path.display().to_string(),
            Location::Memory => ":memory:".to_string(),
        }
    }

    /// Get the backing file path, if any.
    #[must_use]
    pub fn file_path(&self) -> Option<PathBuf> {
        match &self.inner.lock().location {
            Location::File(path) => Some(path.clone()),
            Location::Memory => None,
        }
    }

    /// Size of the backing file in bytes; `0` for in-memory stores.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_path()
            .and_then(|path| std::fs::metadata(path).ok())
            .map_or(0, |meta| meta.len())
    }

    /// Check if the database is healthy.
    ///
    /// # Errors
    ///
    /// Returns an error if the health check fails.
    pub fn health_check(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))
                .map_err(|e| StorageError::Database(format!("health check failed: {e}")).into())
        })
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}

fn open_file_connection(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| StorageError::Database(format!("failed to open database: {e}")).into())
}

/// Configure database settings for optimal performance.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA cache_size = -64000;  -- 64MB cache
        PRAGMA temp_store = MEMORY;
        PRAGMA foreign_keys = ON;
        ",
    )
    .map_err(|e| StorageError::Database(format!("failed to configure database: {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.path(), ":memory:");
        assert!(db.file_path().is_none());
        db.health_check().unwrap();
    }

    #[test]
    fn test_open_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.db");

        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        db.health_check().unwrap();
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("dirs").join("test.db");

        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        db.health_check().unwrap();
    }

    #[test]
    fn test_with_conn() {
        let db = Database::open_in_memory().unwrap();

        let result: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT 42", [], |row| row.get(0))
                    .map_err(|e| StorageError::Database(e.to_string()).into())
            })
            .unwrap();

        assert_eq!(result, 42);
    }

    #[test]
    fn test_with_transaction_commit() {
        let db = Database::open_in_memory().unwrap();

        db.with_conn(|conn| {
            conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY)", [])
                .map_err(|e| StorageError::Database(e.to_string()))?;
            Ok(())
        })
        .unwrap();

        db.with_transaction(|conn| {
            conn.execute("INSERT INTO test (id) VALUES (1)", [])
                .map_err(|e| StorageError::Database(e.to_string()))?;
            Ok(())
        })
        .unwrap();

        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM test", [], |row| row.get(0))
                    .map_err(|e| StorageError::Database(e.to_string()).into())
            })
            .unwrap();

        assert_eq!(count, 1);
    }

    #[test]
    fn test_with_transaction_rollback() {
        let db = Database::open_in_memory().unwrap();

        db.with_conn(|conn| {
            conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY)", [])
                .map_err(|e| StorageError::Database(e.to_string()))?;
            Ok(())
        })
        .unwrap();

        let result: Result<()> = db.with_transaction(|conn| {
            conn.execute("INSERT INTO test (id) VALUES (1)", [])
                .map_err(|e| StorageError::Database(e.to_string()))?;
            Err(crate::Error::internal("simulated failure"))
        });

        assert!(result.is_err());

        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM test", [], |row| row.get(0))
                    .map_err(|e| StorageError::Database(e.to_string()).into())
            })
            .unwrap();

        assert_eq!(count, 0);
    }

    #[test]
    fn test_with_file_access_survives_data() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path().join("test.db")).unwrap();

        db.with_conn(|conn| {
            conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY)", [])
                .map_err(|e| StorageError::Database(e.to_string()))?;
            conn.execute("INSERT INTO test (id) VALUES (7)", [])
                .map_err(|e| StorageError::Database(e.to_string()))?;
            Ok(())
        })
        .unwrap();

        let copy = tmp.path().join("copy.db");
        db.with_file_access(|path| {
            std::fs::copy(path, &copy)?;
            Ok(())
        })
        .unwrap();

        // Store is open again and data intact
        let id: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT id FROM test", [], |row| row.get(0))
                    .map_err(|e| StorageError::Database(e.to_string()).into())
            })
            .unwrap();
        assert_eq!(id, 7);
        assert!(copy.exists());
    }

    #[test]
    fn test_with_file_access_reopens_on_failure() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path().join("test.db")).unwrap();

        let result: Result<()> = db.with_file_access(|_| Err(crate::Error::internal("boom")));
        assert!(result.is_err());

        // The failed file operation must not leave the store closed
        db.health_check().unwrap();
    }

    #[test]
    fn test_with_file_access_rejected_in_memory() {
        let db = Database::open_in_memory().unwrap();
        let result: Result<()> = db.with_file_access(|_| Ok(()));
        assert!(result.is_err());
        db.health_check().unwrap();
    }

    #[test]
    fn test_file_size() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path().join("test.db")).unwrap();
        assert!(db.file_size() > 0);

        let mem = Database::open_in_memory().unwrap();
        assert_eq!(mem.file_size(), 0);
    }

    #[test]
    fn test_clone_shares_connection() {
        let db1 = Database::open_in_memory().unwrap();

        db1.with_conn(|conn| {
            conn.execute("CREATE TABLE test (id INTEGER)", [])
                .map_err(|e| StorageError::Database(e.to_string()))?;
            conn.execute("INSERT INTO test VALUES (123)", [])
                .map_err(|e| StorageError::Database(e.to_string()))?;
            Ok(())
        })
        .unwrap();

        let db2 = db1.clone();
        let value: i64 = db2
            .with_conn(|conn| {
                conn.query_row("SELECT id FROM test", [], |row| row.get(0))
                    .map_err(|e| StorageError::Database(e.to_string()).into())
            })
            .unwrap();

        assert_eq!(value, 123);
    }
}
