//! # LogWriter — structured event logging.
//!
//! Forwards every runtime event to the [`log`] facade, so whatever logger the
//! host application installed (env_logger, systemd journal, ...) sees the
//! full lifecycle.
//!
//! ## Example output
//! ```text
//! [starting] command="java -Xmx4G -jar server.jar nogui"
//! [ready]
//! [crashed] reason="exit status: 1"
//! [restart-scheduled] delay=5000ms crash=1
//! [backup-created] category=daily file="backup_20260807_040000.zip"
//! [restore-failed] category=weekly reason="archive not found"
//! ```
//!
//! Raw console lines are logged at `debug` to keep `info` readable; failures
//! log at `warn`/`error`.

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Logging subscriber backed by the `log` facade.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::ConsoleLine => {
                log::debug!("[console] {}", e.line.as_deref().unwrap_or(""));
            }
            EventKind::ServerStarting => {
                log::info!("[starting] command={:?}", e.line.as_deref().unwrap_or(""));
            }
            EventKind::ServerStarted => {
                log::info!("[started]");
            }
            EventKind::ServerReady => {
                log::info!("[ready]");
            }
            EventKind::ServerStopping => {
                log::info!("[stopping]");
            }
            EventKind::ServerStopped => {
                log::info!("[stopped]");
            }
            EventKind::ServerCrashed => {
                log::warn!("[crashed] reason={:?}", e.reason.as_deref().unwrap_or("unknown"));
            }
            EventKind::RestartScheduled => {
                log::warn!(
                    "[restart-scheduled] delay={}ms crash={}",
                    e.delay_ms.unwrap_or(0),
                    e.attempt.unwrap_or(0)
                );
            }
            EventKind::PlayerJoined => {
                log::info!("[player-joined] {:?}", e.player.as_deref().unwrap_or(""));
            }
            EventKind::PlayerLeft => {
                log::info!("[player-left] {:?}", e.player.as_deref().unwrap_or(""));
            }
            EventKind::StatsSampled => {
                if let Some(stats) = &e.stats {
                    log::info!(
                        "[stats] players={} tps={} memory={} uptime={}",
                        stats.online_players,
                        stats.tps,
                        stats.memory,
                        stats.uptime
                    );
                }
            }
            EventKind::BackupPassStarted => {
                log::info!("[backup-pass-started]");
            }
            EventKind::BackupPassCompleted => match e.reason.as_deref() {
                Some(failures) => log::warn!("[backup-pass-completed] failures={failures}"),
                None => log::info!("[backup-pass-completed]"),
            },
            EventKind::BackupStarted => {
                log::info!("[backup-started] category={:?}", e.category);
            }
            EventKind::BackupCreated => {
                log::info!(
                    "[backup-created] category={:?} file={:?}",
                    e.category,
                    e.file.as_deref().unwrap_or("")
                );
            }
            EventKind::BackupFailed => {
                log::error!(
                    "[backup-failed] category={:?} reason={:?}",
                    e.category,
                    e.reason.as_deref().unwrap_or("")
                );
            }
            EventKind::BackupPruned => {
                log::info!(
                    "[backup-pruned] category={:?} deleted={:?}",
                    e.category,
                    e.reason.as_deref().unwrap_or("")
                );
            }
            EventKind::BackupDeleted => {
                log::info!(
                    "[backup-deleted] category={:?} file={:?}",
                    e.category,
                    e.file.as_deref().unwrap_or("")
                );
            }
            EventKind::RestoreStarted => {
                log::info!(
                    "[restore-started] category={:?} file={:?}",
                    e.category,
                    e.file.as_deref().unwrap_or("")
                );
            }
            EventKind::RestoreCompleted => {
                log::info!(
                    "[restore-completed] category={:?} file={:?}",
                    e.category,
                    e.file.as_deref().unwrap_or("")
                );
            }
            EventKind::RestoreFailed => {
                log::error!(
                    "[restore-failed] category={:?} reason={:?}",
                    e.category,
                    e.reason.as_deref().unwrap_or("")
                );
            }
            EventKind::NoticeScheduled => {
                log::info!("[notices-armed] count={}", e.attempt.unwrap_or(0));
            }
            EventKind::NoticeSent => {
                log::info!("[notice-sent] {:?}", e.line.as_deref().unwrap_or(""));
            }
            EventKind::ShutdownRequested => {
                log::info!("[shutdown-requested]");
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                log::warn!("[subscriber] {:?}", e.reason.as_deref().unwrap_or(""));
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
