//! Compressed snapshots of the server directory.
//!
//! ## Contents
//! - [`BackupCategory`] — manual/daily/weekly/monthly, each independently
//!   enabled and retained
//! - [`ArchiveRecord`] — one created archive (category + timestamped filename)
//! - [`ArchiveStore`] — create/restore/list/prune/delete over
//!   `<backup_root>/<category>/backup_<yyyyMMdd_HHmmss>.zip`
//!
//! The store is synchronous filesystem code; async callers wrap operations in
//! [`tokio::task::spawn_blocking`].

mod store;

use chrono::{DateTime, Local};

pub use store::ArchiveStore;

/// Backup category. Each category has its own directory under the backup
/// root, its own retention cap, and (for weekly/monthly) a calendar predicate
/// deciding when the scheduled pass runs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackupCategory {
    /// Operator-triggered backups; never run by the scheduler.
    Manual,
    /// Every scheduled pass.
    Daily,
    /// Scheduled passes on ISO Sunday.
    Weekly,
    /// Scheduled passes on day-of-month 1.
    Monthly,
}

impl BackupCategory {
    /// Directory name under the backup root.
    pub fn dir_name(self) -> &'static str {
        match self {
            BackupCategory::Manual => "manual",
            BackupCategory::Daily => "daily",
            BackupCategory::Weekly => "weekly",
            BackupCategory::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for BackupCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One created archive.
#[derive(Debug, Clone)]
pub struct ArchiveRecord {
    /// Category the archive was filed under.
    pub category: BackupCategory,
    /// Timestamped filename, `backup_<yyyyMMdd_HHmmss>.zip`.
    pub filename: String,
    /// Creation wall-clock time.
    pub created_at: DateTime<Local>,
}
