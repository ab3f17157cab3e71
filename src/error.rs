//! Error types used by the supervisor, archive store, and orchestrator.
//!
//! This module defines three error enums, one per component boundary:
//!
//! - [`ProcessError`] — state-machine violations and I/O failures of the
//!   supervised process.
//! - [`ArchiveError`] — archive container and filesystem failures.
//! - [`OrchestratorError`] — coordination failures of backup/restore sagas.
//!
//! All types provide `as_label()` for logs/metrics. State-machine violations
//! (`AlreadyRunning`, `NotRunning`) are returned to the caller, never silently
//! ignored; per-file copy errors during archiving are *not* represented here —
//! they are logged and skipped at the call site.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the process supervisor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProcessError {
    /// `start` was called while a session is active.
    #[error("server is already running")]
    AlreadyRunning,

    /// `send_command` (or an internal write) was attempted with no running session.
    #[error("server is not running")]
    NotRunning,

    /// The child process could not be spawned.
    #[error("failed to spawn server process: {0}")]
    Spawn(#[source] std::io::Error),

    /// Writing to the child's stdin failed.
    #[error("failed to write to server stdin: {0}")]
    Stdin(#[source] std::io::Error),
}

impl ProcessError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::AlreadyRunning => "process_already_running",
            ProcessError::NotRunning => "process_not_running",
            ProcessError::Spawn(_) => "process_spawn_failed",
            ProcessError::Stdin(_) => "process_stdin_failed",
        }
    }
}

/// Errors produced by the archive store.
///
/// Per-file copy errors while building an archive are deliberately absent:
/// they are logged and skipped without aborting the archive. Only a failure
/// of the container itself (create/open/finish) is fatal.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The named archive does not exist in the given category.
    #[error("archive not found: {path}")]
    NotFound { path: PathBuf },

    /// The archive container could not be created or finalized.
    #[error("failed to write archive {path}: {source}")]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Extraction of an existing archive failed.
    #[error("failed to extract archive {path}: {source}")]
    ExtractFailed {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Filesystem operation failed.
    #[error("archive i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ArchiveError::NotFound { .. } => "archive_not_found",
            ArchiveError::CreateFailed { .. } => "archive_write_failed",
            ArchiveError::ExtractFailed { .. } => "archive_extract_failed",
            ArchiveError::Io(_) => "archive_io_failed",
        }
    }
}

/// Errors produced by the backup orchestrator.
///
/// These wrap component failures with the step they occurred in, so callers
/// can distinguish "the archive failed but the server is back up" from "the
/// restore failed and the server was deliberately left stopped".
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Creating or pruning an archive failed. The server restart was still attempted.
    #[error("backup failed: {0}")]
    Archive(#[from] ArchiveError),

    /// Restoring an archive failed. The process is left stopped for operator intervention.
    #[error("restore failed, server left stopped: {0}")]
    RestoreFailed(#[source] ArchiveError),

    /// A supervisor operation inside the saga failed.
    #[error("process control failed: {0}")]
    Process(#[from] ProcessError),
}

impl OrchestratorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            OrchestratorError::Archive(_) => "backup_failed",
            OrchestratorError::RestoreFailed(_) => "restore_failed",
            OrchestratorError::Process(_) => "backup_process_failed",
        }
    }
}
