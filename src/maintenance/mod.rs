//! Lifecycle management: statistics, backups, export/import trees.

mod backup;
mod export;
mod import;
mod stats;

pub use backup::{
    create_backup, list_backups, optimize, restore_backup, BackupInfo, OptimizeReport,
};
pub use export::export_tree;
pub use import::{import_tree, ImportStats};
pub use stats::{gather_statistics, QueryCount, RecentAddition, Statistics};
