//! # Archive store: zip snapshots with per-category retention.
//!
//! [`ArchiveStore`] owns the backup root directory and the mapping from
//! [`BackupCategory`] to `<backup_root>/<category>/`. All operations are
//! synchronous; the orchestrator runs them inside `spawn_blocking`.
//!
//! ## Rules
//! - Entry paths are POSIX-style (`/`-separated) relative paths from the
//!   server directory, regardless of host path convention.
//! - Anything under the backup root itself is excluded from new archives.
//! - Per-file copy errors are logged and skipped; only a container-level
//!   failure aborts an archive.
//! - Restore extracts into a temporary staging directory first, then copies
//!   over the server directory, so a corrupt archive never partially
//!   overwrites live files. The staging directory is removed best-effort.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Local;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::ArchiveError;

use super::{ArchiveRecord, BackupCategory};

/// Filename prefix for every archive this store creates.
const ARCHIVE_PREFIX: &str = "backup_";
/// Filename extension for every archive this store creates.
const ARCHIVE_EXT: &str = ".zip";

/// Creates, lists, restores, prunes, and deletes zip snapshots of the server
/// directory.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    server_dir: PathBuf,
    backup_root: PathBuf,
}

impl ArchiveStore {
    /// Creates a store for the given server directory and backup root.
    ///
    /// The backup root may live inside the server directory; new archives
    /// exclude it.
    pub fn new(server_dir: impl Into<PathBuf>, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            server_dir: server_dir.into(),
            backup_root: backup_root.into(),
        }
    }

    /// The supervised server's working directory.
    pub fn server_dir(&self) -> &Path {
        &self.server_dir
    }

    fn category_dir(&self, category: BackupCategory) -> PathBuf {
        self.backup_root.join(category.dir_name())
    }

    /// Archives every regular file under the server directory into a new
    /// timestamped zip in the category's directory.
    pub fn create(&self, category: BackupCategory) -> Result<ArchiveRecord, ArchiveError> {
        let dir = self.category_dir(category);
        fs::create_dir_all(&dir)?;

        // Compare canonical paths so the exclusion holds however the backup
        // root was spelled in configuration.
        let server_dir = self.server_dir.canonicalize()?;
        let backup_root = self
            .backup_root
            .canonicalize()
            .unwrap_or_else(|_| self.backup_root.clone());

        let created_at = Local::now();
        let filename = format!(
            "{ARCHIVE_PREFIX}{}{ARCHIVE_EXT}",
            created_at.format("%Y%m%d_%H%M%S")
        );
        let path = dir.join(&filename);

        let file = File::create(&path)?;
        let mut writer = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in WalkDir::new(&server_dir) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("skipping unreadable path during backup: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().starts_with(&backup_root) {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&server_dir) else {
                continue;
            };
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            writer
                .start_file(&*name, options)
                .map_err(|source| ArchiveError::CreateFailed {
                    path: path.clone(),
                    source,
                })?;
            match File::open(entry.path()) {
                Ok(mut src) => {
                    if let Err(err) = io::copy(&mut src, &mut writer) {
                        log::warn!("failed to copy {name} into backup: {err}");
                    }
                }
                Err(err) => {
                    log::warn!("failed to open {name} for backup: {err}");
                }
            }
        }

        writer
            .finish()
            .map_err(|source| ArchiveError::CreateFailed {
                path: path.clone(),
                source,
            })?;

        Ok(ArchiveRecord {
            category,
            filename,
            created_at,
        })
    }

    /// Restores the named archive over the server directory.
    ///
    /// Two-phase: the archive is fully extracted into a staging directory
    /// first; only then are the extracted entries copied over the live tree,
    /// overwriting existing files.
    pub fn restore(&self, category: BackupCategory, filename: &str) -> Result<(), ArchiveError> {
        let path = self.category_dir(category).join(filename);
        if !path.exists() {
            return Err(ArchiveError::NotFound { path });
        }

        let staging = tempfile::Builder::new()
            .prefix("servisor_restore_")
            .tempdir()?;

        let file = File::open(&path)?;
        let mut archive = ZipArchive::new(file).map_err(|source| ArchiveError::ExtractFailed {
            path: path.clone(),
            source,
        })?;
        archive
            .extract(staging.path())
            .map_err(|source| ArchiveError::ExtractFailed {
                path: path.clone(),
                source,
            })?;

        for entry in WalkDir::new(staging.path()) {
            let entry = entry.map_err(|e| ArchiveError::Io(io::Error::other(e)))?;
            let Ok(rel) = entry.path().strip_prefix(staging.path()) else {
                continue;
            };
            if rel.as_os_str().is_empty() {
                continue;
            }
            let dest = self.server_dir.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)?;
            } else {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(entry.path(), &dest)?;
            }
        }

        // `staging` drops here; removal failures are ignored by TempDir.
        Ok(())
    }

    /// Lists archive filenames in the category, newest first.
    ///
    /// Timestamped names sort chronologically, so lexicographic descending
    /// order is newest-first.
    pub fn list(&self, category: BackupCategory) -> Result<Vec<String>, ArchiveError> {
        let dir = self.category_dir(category);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(ARCHIVE_PREFIX) && name.ends_with(ARCHIVE_EXT))
            .collect();
        names.sort_by(|a, b| b.cmp(a));
        Ok(names)
    }

    /// Deletes the oldest archives (by filesystem modification time) until at
    /// most `max_kept` remain. Returns the deleted filenames.
    pub fn prune(
        &self,
        category: BackupCategory,
        max_kept: usize,
    ) -> Result<Vec<String>, ArchiveError> {
        let dir = self.category_dir(category);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut archives: Vec<(PathBuf, SystemTime)> = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(ARCHIVE_PREFIX) || !name.ends_with(ARCHIVE_EXT) {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            archives.push((entry.path(), modified));
        }

        if archives.len() <= max_kept {
            return Ok(Vec::new());
        }

        archives.sort_by_key(|(_, modified)| *modified);
        let excess = archives.len() - max_kept;
        let mut deleted = Vec::with_capacity(excess);
        for (path, _) in archives.into_iter().take(excess) {
            fs::remove_file(&path)?;
            if let Some(name) = path.file_name() {
                deleted.push(name.to_string_lossy().into_owned());
            }
        }
        Ok(deleted)
    }

    /// Deletes one archive by name.
    pub fn delete(&self, category: BackupCategory, filename: &str) -> Result<(), ArchiveError> {
        let path = self.category_dir(category).join(filename);
        if !path.exists() {
            return Err(ArchiveError::NotFound { path });
        }
        fs::remove_file(&path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn write_file(path: &Path, contents: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = File::create(path).unwrap();
        f.write_all(contents).unwrap();
    }

    fn store_with_fixture() -> (tempfile::TempDir, ArchiveStore) {
        let dir = tempfile::tempdir().unwrap();
        let server = dir.path().join("server");
        write_file(&server.join("server.properties"), b"motd=hello");
        write_file(&server.join("world/level.dat"), b"\x00\x01\x02");
        write_file(&server.join("world/region/r.0.0.mca"), b"region-bytes");
        let store = ArchiveStore::new(&server, server.join("backups"));
        (dir, store)
    }

    #[test]
    fn round_trip_preserves_content_and_relative_paths() {
        let (_guard, store) = store_with_fixture();
        let record = store.create(BackupCategory::Manual).unwrap();

        // Mutate and remove files, then restore.
        let server = store.server_dir().to_path_buf();
        write_file(&server.join("world/level.dat"), b"corrupted");
        fs::remove_file(server.join("world/region/r.0.0.mca")).unwrap();

        store
            .restore(BackupCategory::Manual, &record.filename)
            .unwrap();

        assert_eq!(
            fs::read(server.join("server.properties")).unwrap(),
            b"motd=hello"
        );
        assert_eq!(fs::read(server.join("world/level.dat")).unwrap(), b"\x00\x01\x02");
        assert_eq!(
            fs::read(server.join("world/region/r.0.0.mca")).unwrap(),
            b"region-bytes"
        );
    }

    #[test]
    fn archives_never_contain_the_backup_root() {
        let (_guard, store) = store_with_fixture();
        // A prior archive sits under the backup root; the next archive must
        // not swallow it.
        let first = store.create(BackupCategory::Daily).unwrap();
        let second = store.create(BackupCategory::Daily).unwrap();

        let path = store
            .backup_root
            .join("daily")
            .join(&second.filename);
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        for i in 0..archive.len() {
            let entry = archive.by_index(i).unwrap();
            assert!(
                !entry.name().starts_with("backups/"),
                "archive contains backup root entry: {} (first archive was {})",
                entry.name(),
                first.filename
            );
            assert!(!entry.name().contains('\\'));
        }
    }

    #[test]
    fn list_is_newest_first() {
        let (_guard, store) = store_with_fixture();
        let dir = store.backup_root.join("weekly");
        fs::create_dir_all(&dir).unwrap();
        for name in [
            "backup_20240101_000000.zip",
            "backup_20240301_000000.zip",
            "backup_20240201_000000.zip",
            "not-a-backup.txt",
        ] {
            write_file(&dir.join(name), b"");
        }
        let listed = store.list(BackupCategory::Weekly).unwrap();
        assert_eq!(
            listed,
            vec![
                "backup_20240301_000000.zip",
                "backup_20240201_000000.zip",
                "backup_20240101_000000.zip",
            ]
        );
    }

    #[test]
    fn prune_deletes_oldest_by_mtime() {
        let (_guard, store) = store_with_fixture();
        let dir = store.backup_root.join("daily");
        fs::create_dir_all(&dir).unwrap();

        let base = SystemTime::now() - Duration::from_secs(3_600);
        for (i, name) in [
            "backup_20240101_000000.zip",
            "backup_20240102_000000.zip",
            "backup_20240103_000000.zip",
            "backup_20240104_000000.zip",
        ]
        .iter()
        .enumerate()
        {
            let path = dir.join(name);
            write_file(&path, b"");
            let f = File::options().write(true).open(&path).unwrap();
            f.set_modified(base + Duration::from_secs(i as u64 * 60)).unwrap();
        }

        let deleted = store.prune(BackupCategory::Daily, 2).unwrap();
        assert_eq!(
            deleted,
            vec!["backup_20240101_000000.zip", "backup_20240102_000000.zip"]
        );
        let remaining = store.list(BackupCategory::Daily).unwrap();
        assert_eq!(
            remaining,
            vec!["backup_20240104_000000.zip", "backup_20240103_000000.zip"]
        );
    }

    #[test]
    fn prune_under_cap_is_a_no_op() {
        let (_guard, store) = store_with_fixture();
        store.create(BackupCategory::Daily).unwrap();
        assert!(store.prune(BackupCategory::Daily, 5).unwrap().is_empty());
        assert_eq!(store.list(BackupCategory::Daily).unwrap().len(), 1);
    }

    #[test]
    fn restore_of_missing_archive_is_not_found() {
        let (_guard, store) = store_with_fixture();
        let err = store
            .restore(BackupCategory::Manual, "backup_19700101_000000.zip")
            .unwrap_err();
        assert!(matches!(err, ArchiveError::NotFound { .. }));
    }

    #[test]
    fn delete_of_missing_archive_is_not_found() {
        let (_guard, store) = store_with_fixture();
        let err = store
            .delete(BackupCategory::Manual, "backup_19700101_000000.zip")
            .unwrap_err();
        assert!(matches!(err, ArchiveError::NotFound { .. }));
    }
}
