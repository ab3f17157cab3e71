//! # BackupOrchestrator: schedules backups and coordinates them with the
//! supervisor.
//!
//! The orchestrator owns one recurring schedule handle and the currently
//! armed batch of notification timers. Backup and restore are explicit
//! multi-step sagas over the supervisor's stop future:
//!
//! ```text
//! create_backup(category):
//!   server stopped ──► archive ──► done
//!   server running ──► stop() ──► wait exit ──► archive ──► restart
//!                                   │              │           │
//!                                   │              └ failure is reported, the
//!                                   │                restart still happens
//!                                   └ the StopFuture is the only wait
//!
//! restore_backup(category, file):
//!   same coordination, but a restore failure performs NO restart — the
//!   server stays down for operator intervention.
//! ```
//!
//! ## Rules
//! - Scheduled categories run **independently**: one category's failure is
//!   caught and reported, the remaining categories still run, and the pass
//!   emits a single completion/partial-failure summary.
//! - Arming a schedule or a notification batch cancels its predecessor
//!   atomically (token swap); there is never more than one live schedule.
//! - Archive and restore run on the blocking pool; the async side only waits
//!   on the stop future and the timers.

use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime};
use tokio::task;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::archive::{ArchiveRecord, ArchiveStore, BackupCategory};
use crate::config::BackupConfig;
use crate::error::{ArchiveError, OrchestratorError};
use crate::events::{Bus, Event, EventKind};
use crate::process::ProcessSupervisor;

use super::{calendar, notify};

/// Period of the recurring scheduled pass.
const PASS_PERIOD: Duration = Duration::from_secs(24 * 3600);

/// Coordinates scheduled and operator-triggered backups with the process
/// supervisor and the archive store.
pub struct BackupOrchestrator {
    cfg: StdRwLock<BackupConfig>,
    supervisor: Arc<ProcessSupervisor>,
    store: Arc<ArchiveStore>,
    bus: Bus,
    schedule: StdMutex<Option<CancellationToken>>,
    notices: StdMutex<Option<CancellationToken>>,
}

impl BackupOrchestrator {
    /// Creates an orchestrator; nothing is scheduled until
    /// [`start_schedule`](Self::start_schedule).
    pub fn new(
        cfg: BackupConfig,
        supervisor: Arc<ProcessSupervisor>,
        store: Arc<ArchiveStore>,
        bus: Bus,
    ) -> Arc<Self> {
        Arc::new(Self {
            cfg: StdRwLock::new(cfg),
            supervisor,
            store,
            bus,
            schedule: StdMutex::new(None),
            notices: StdMutex::new(None),
        })
    }

    /// Replaces the backup configuration (retention, schedule time, notices).
    ///
    /// Takes effect on the next `start_schedule` / pass / notification batch;
    /// a changed backup root requires rebuilding the daemon, since the
    /// archive store owns its directories.
    pub fn update_config(&self, cfg: BackupConfig) {
        *self.cfg.write().expect("backup config lock poisoned") = cfg;
    }

    /// Arms the daily schedule at the configured time of day, replacing any
    /// previously armed schedule.
    ///
    /// The first pass runs at the next occurrence of the configured time
    /// (today if still ahead, else tomorrow), then every 24 h. Each upcoming
    /// pass also arms the pre-maintenance notification batch for its target.
    pub fn start_schedule(self: &Arc<Self>) {
        self.stop_schedule();
        let cfg = self.read_cfg();
        if !cfg.enabled {
            self.bus
                .publish(Event::console("Backup scheduler is disabled in settings"));
            return;
        }

        let initial = calendar::delay_until(Local::now().naive_local(), cfg.time_of_day);
        let token = CancellationToken::new();
        *self.schedule.lock().expect("schedule lock poisoned") = Some(token.clone());

        self.bus.publish(Event::console(format!(
            "Backup scheduler started. Next backup at: {}",
            Local::now().naive_local()
                + chrono::Duration::from_std(initial).unwrap_or_else(|_| chrono::Duration::zero())
        )));

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut delay = initial;
            loop {
                if let Ok(ahead) = chrono::Duration::from_std(delay) {
                    orchestrator
                        .schedule_restart_notifications(Local::now().naive_local() + ahead);
                }
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = time::sleep(delay) => {}
                }
                orchestrator
                    .run_scheduled_pass(Local::now().date_naive())
                    .await;
                delay = PASS_PERIOD;
            }
        });
    }

    /// Cancels the recurring schedule, if armed.
    pub fn stop_schedule(&self) {
        let token = self.schedule.lock().expect("schedule lock poisoned").take();
        if let Some(token) = token {
            token.cancel();
            self.bus.publish(Event::console("Backup scheduler stopped"));
        }
    }

    /// Runs one scheduled pass for the given date.
    ///
    /// Every enabled category whose calendar predicate matches runs
    /// `create_backup` followed by retention pruning, independently; one
    /// category's failure does not block the others.
    pub async fn run_scheduled_pass(self: &Arc<Self>, date: NaiveDate) {
        self.bus.publish(Event::new(EventKind::BackupPassStarted));
        self.bus.publish(Event::console(format!(
            "Starting scheduled backup pass for {date}"
        )));

        let cfg = self.read_cfg();
        let mut failures: Vec<String> = Vec::new();
        for category in calendar::SCHEDULED {
            let policy = cfg.policy(category);
            if !policy.enabled || !calendar::is_due(category, date) {
                continue;
            }
            match self.create_backup(category).await {
                Ok(_) => {
                    if let Err(err) = self.prune(category, policy.max_kept).await {
                        failures.push(format!("{category}: {err}"));
                    }
                }
                Err(err) => failures.push(format!("{category}: {err}")),
            }
        }

        if failures.is_empty() {
            self.bus
                .publish(Event::console("All scheduled backups completed"));
            self.bus.publish(Event::new(EventKind::BackupPassCompleted));
        } else {
            let summary = failures.join("; ");
            self.bus
                .publish(Event::console(format!("Some backups failed: {summary}")));
            self.bus
                .publish(Event::new(EventKind::BackupPassCompleted).with_reason(summary));
        }
    }

    /// Creates one backup, coordinating a stop/restart when the server runs.
    ///
    /// Stopped server: archives synchronously (on the blocking pool) and
    /// returns. Running server: stop → await exit → archive → restart with
    /// the last-known command. An archive failure is reported and the restart
    /// is still attempted, so the service is not left down.
    pub async fn create_backup(
        self: &Arc<Self>,
        category: BackupCategory,
    ) -> Result<ArchiveRecord, OrchestratorError> {
        self.bus
            .publish(Event::new(EventKind::BackupStarted).with_category(category));

        if !self.supervisor.is_running().await {
            return self.archive(category).await;
        }

        let stop = self.supervisor.stop().await;
        stop.wait().await;

        let archived = self.archive(category).await;

        let restart_err = match self.supervisor.last_command().await {
            Some(command) => self.supervisor.start(command).await.err(),
            None => None,
        };
        if let Some(err) = &restart_err {
            self.bus.publish(Event::console(format!(
                "Failed to restart server after backup: {err}"
            )));
        }

        match (archived, restart_err) {
            (Ok(record), None) => Ok(record),
            (Ok(_), Some(err)) => Err(OrchestratorError::Process(err)),
            (Err(err), _) => Err(err),
        }
    }

    /// Restores one archive, coordinating a stop/restart when the server runs.
    ///
    /// A restore failure deliberately leaves the process stopped: restoring
    /// into a running (or restarted) server is unsafe, so the operator has to
    /// intervene. The restart happens only after a successful restore, and
    /// only if the server was running before.
    pub async fn restore_backup(
        self: &Arc<Self>,
        category: BackupCategory,
        filename: &str,
    ) -> Result<(), OrchestratorError> {
        self.bus.publish(
            Event::new(EventKind::RestoreStarted)
                .with_category(category)
                .with_file(filename.to_string()),
        );
        self.bus
            .publish(Event::console("Starting backup restore procedure"));

        let was_running = self.supervisor.is_running().await;
        if was_running {
            let stop = self.supervisor.stop().await;
            stop.wait().await;
        }

        let store = Arc::clone(&self.store);
        let name = filename.to_string();
        let restored = task::spawn_blocking(move || store.restore(category, &name))
            .await
            .map_err(|err| ArchiveError::Io(std::io::Error::other(err)))
            .and_then(|result| result);

        match restored {
            Ok(()) => {
                self.bus
                    .publish(Event::console(format!("Backup restored: {filename}")));
                self.bus.publish(
                    Event::new(EventKind::RestoreCompleted)
                        .with_category(category)
                        .with_file(filename.to_string()),
                );
                if was_running {
                    if let Some(command) = self.supervisor.last_command().await {
                        if let Err(err) = self.supervisor.start(command).await {
                            self.bus.publish(Event::console(format!(
                                "Failed to restart server after restore: {err}"
                            )));
                            return Err(OrchestratorError::Process(err));
                        }
                    }
                }
                Ok(())
            }
            Err(err) => {
                self.bus
                    .publish(Event::console(format!("Backup restore failed: {err}")));
                self.bus.publish(
                    Event::new(EventKind::RestoreFailed)
                        .with_category(category)
                        .with_file(filename.to_string())
                        .with_reason(err.to_string()),
                );
                Err(OrchestratorError::RestoreFailed(err))
            }
        }
    }

    /// Lists archive filenames in a category, newest first.
    pub async fn list_backups(
        &self,
        category: BackupCategory,
    ) -> Result<Vec<String>, ArchiveError> {
        let store = Arc::clone(&self.store);
        task::spawn_blocking(move || store.list(category))
            .await
            .map_err(|err| ArchiveError::Io(std::io::Error::other(err)))?
    }

    /// Deletes one archive by operator request.
    pub async fn delete_backup(
        &self,
        category: BackupCategory,
        filename: &str,
    ) -> Result<(), ArchiveError> {
        let store = Arc::clone(&self.store);
        let name = filename.to_string();
        task::spawn_blocking(move || store.delete(category, &name))
            .await
            .map_err(|err| ArchiveError::Io(std::io::Error::other(err)))??;
        self.bus
            .publish(Event::console(format!("Backup deleted: {filename}")));
        self.bus.publish(
            Event::new(EventKind::BackupDeleted)
                .with_category(category)
                .with_file(filename.to_string()),
        );
        Ok(())
    }

    /// Arms one one-shot in-game notification per configured offset that
    /// still fits before `target`, cancelling any previously armed batch.
    ///
    /// Each timer, on firing, substitutes its offset label into the template
    /// and relays the message as an in-game `say` broadcast.
    pub fn schedule_restart_notifications(self: &Arc<Self>, target: NaiveDateTime) {
        self.cancel_notifications();
        let cfg = self.read_cfg();
        if !cfg.enabled || !cfg.notices.enabled {
            return;
        }

        let planned = notify::plan(Local::now().naive_local(), target, &cfg.notices.offsets);
        if planned.is_empty() {
            return;
        }

        let token = CancellationToken::new();
        *self.notices.lock().expect("notices lock poisoned") = Some(token.clone());

        let count = planned.len() as u32;
        for (offset, delay) in planned {
            let orchestrator = Arc::clone(self);
            let guard = token.clone();
            let template = cfg.notices.template.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = guard.cancelled() => return,
                    _ = time::sleep(delay) => {}
                }
                let message = notify::render(&template, &offset.label);
                match orchestrator
                    .supervisor
                    .send_command(&format!("say {message}"))
                    .await
                {
                    Ok(()) => orchestrator
                        .bus
                        .publish(Event::new(EventKind::NoticeSent).with_line(message)),
                    Err(err) => orchestrator.bus.publish(Event::console(format!(
                        "Error sending notification: {err}"
                    ))),
                }
            });
        }
        self.bus
            .publish(Event::new(EventKind::NoticeScheduled).with_attempt(count));
    }

    /// Cancels the armed notification batch wholesale.
    pub fn cancel_notifications(&self) {
        if let Some(token) = self.notices.lock().expect("notices lock poisoned").take() {
            token.cancel();
        }
    }

    /// Cancels the schedule and any pending notifications.
    pub fn shutdown(&self) {
        self.cancel_notifications();
        self.stop_schedule();
    }

    fn read_cfg(&self) -> BackupConfig {
        self.cfg.read().expect("backup config lock poisoned").clone()
    }

    /// Runs `ArchiveStore::create` on the blocking pool and publishes the
    /// outcome.
    async fn archive(&self, category: BackupCategory) -> Result<ArchiveRecord, OrchestratorError> {
        let store = Arc::clone(&self.store);
        let result = task::spawn_blocking(move || store.create(category))
            .await
            .map_err(|err| {
                OrchestratorError::Archive(ArchiveError::Io(std::io::Error::other(err)))
            })?;
        match result {
            Ok(record) => {
                self.bus
                    .publish(Event::console(format!("Backup created: {}", record.filename)));
                self.bus.publish(
                    Event::new(EventKind::BackupCreated)
                        .with_category(category)
                        .with_file(record.filename.clone()),
                );
                Ok(record)
            }
            Err(err) => {
                self.bus.publish(Event::console(format!(
                    "Backup creation failed for {category}: {err}"
                )));
                self.bus.publish(
                    Event::new(EventKind::BackupFailed)
                        .with_category(category)
                        .with_reason(err.to_string()),
                );
                Err(err.into())
            }
        }
    }

    /// Runs retention pruning on the blocking pool and publishes what was
    /// deleted.
    async fn prune(
        &self,
        category: BackupCategory,
        max_kept: usize,
    ) -> Result<Vec<String>, ArchiveError> {
        let store = Arc::clone(&self.store);
        let deleted = task::spawn_blocking(move || store.prune(category, max_kept))
            .await
            .map_err(|err| ArchiveError::Io(std::io::Error::other(err)))??;
        if !deleted.is_empty() {
            for name in &deleted {
                self.bus
                    .publish(Event::console(format!("Deleted old backup: {name}")));
            }
            self.bus.publish(
                Event::new(EventKind::BackupPruned)
                    .with_category(category)
                    .with_reason(deleted.join(", ")),
            );
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CategoryPolicy, ProcessConfig};
    use crate::policies::{BackoffPolicy, JitterPolicy, RestartPolicy};
    use chrono::NaiveDate;
    use std::fs;
    use std::path::Path;

    const OBEDIENT_SERVER: &str =
        r#"sh -c 'while read line; do if [ "$line" = "stop" ]; then exit 0; fi; done'"#;

    fn write_file(path: &Path, contents: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn fixture() -> (
        tempfile::TempDir,
        Arc<BackupOrchestrator>,
        Arc<ProcessSupervisor>,
        Arc<ArchiveStore>,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let server_dir = dir.path().join("server");
        write_file(&server_dir.join("server.properties"), b"motd=test");
        write_file(&server_dir.join("world/level.dat"), b"level");

        let bus = Bus::new(256);
        let process_cfg = ProcessConfig {
            stop_command: "stop".to_string(),
            kill_deadline: Duration::from_millis(400),
            settle_delay: Duration::from_millis(10),
            poll_interval: Duration::from_secs(3600),
            restart: RestartPolicy::Never,
            crash_backoff: BackoffPolicy {
                first: Duration::from_millis(50),
                max: Duration::from_millis(50),
                factor: 1.0,
                jitter: JitterPolicy::None,
            },
        };
        let supervisor = ProcessSupervisor::new(process_cfg, bus.clone());
        let store = Arc::new(ArchiveStore::new(&server_dir, server_dir.join("backups")));

        let backup_cfg = BackupConfig {
            root: server_dir.join("backups"),
            ..BackupConfig::default()
        };
        let orchestrator = BackupOrchestrator::new(
            backup_cfg,
            Arc::clone(&supervisor),
            Arc::clone(&store),
            bus,
        );
        (dir, orchestrator, supervisor, store)
    }

    #[tokio::test]
    async fn stopped_server_is_archived_without_coordination() {
        let (_guard, orchestrator, supervisor, store) = fixture();
        let record = orchestrator
            .create_backup(BackupCategory::Manual)
            .await
            .unwrap();
        assert!(!supervisor.is_running().await);
        assert_eq!(
            store.list(BackupCategory::Manual).unwrap(),
            vec![record.filename]
        );
    }

    #[tokio::test]
    async fn running_server_is_stopped_archived_and_restarted() {
        let (_guard, orchestrator, supervisor, store) = fixture();
        supervisor.start(OBEDIENT_SERVER).await.unwrap();

        orchestrator
            .create_backup(BackupCategory::Daily)
            .await
            .unwrap();

        assert!(supervisor.is_running().await, "server was not restarted");
        assert_eq!(store.list(BackupCategory::Daily).unwrap().len(), 1);

        supervisor.stop().await.wait().await;
    }

    #[tokio::test]
    async fn failed_restore_leaves_server_stopped() {
        let (_guard, orchestrator, supervisor, _store) = fixture();
        supervisor.start(OBEDIENT_SERVER).await.unwrap();

        let err = orchestrator
            .restore_backup(BackupCategory::Manual, "backup_19700101_000000.zip")
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::RestoreFailed(_)));
        assert!(
            !supervisor.is_running().await,
            "server must stay down after a failed restore"
        );
    }

    #[tokio::test]
    async fn successful_restore_restarts_a_previously_running_server() {
        let (_guard, orchestrator, supervisor, _store) = fixture();
        let record = orchestrator
            .create_backup(BackupCategory::Manual)
            .await
            .unwrap();

        supervisor.start(OBEDIENT_SERVER).await.unwrap();
        orchestrator
            .restore_backup(BackupCategory::Manual, &record.filename)
            .await
            .unwrap();
        assert!(supervisor.is_running().await);

        supervisor.stop().await.wait().await;
    }

    #[tokio::test]
    async fn scheduled_pass_runs_only_due_categories() {
        let (_guard, orchestrator, _supervisor, store) = fixture();
        // 2024-01-02: a Tuesday, not the 1st. Only daily is due.
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        orchestrator.run_scheduled_pass(date).await;

        assert_eq!(store.list(BackupCategory::Daily).unwrap().len(), 1);
        assert!(store.list(BackupCategory::Weekly).unwrap().is_empty());
        assert!(store.list(BackupCategory::Monthly).unwrap().is_empty());
    }

    #[tokio::test]
    async fn scheduled_pass_respects_disabled_categories() {
        let (_guard, orchestrator, _supervisor, store) = fixture();
        {
            let mut cfg = orchestrator.read_cfg();
            cfg.daily = CategoryPolicy {
                enabled: false,
                max_kept: 7,
            };
            orchestrator.update_config(cfg);
        }
        // 2024-01-07: a Sunday. Weekly due, daily disabled.
        let date = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        orchestrator.run_scheduled_pass(date).await;

        assert!(store.list(BackupCategory::Daily).unwrap().is_empty());
        assert_eq!(store.list(BackupCategory::Weekly).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn one_failing_category_does_not_block_the_others() {
        let (_guard, orchestrator, _supervisor, _store) = fixture();
        let mut rx = orchestrator.bus.subscribe();

        // Remove the server directory so every archive attempt fails.
        fs::remove_dir_all(orchestrator.store.server_dir()).unwrap();

        // 2024-09-01: a Sunday *and* the 1st. All three categories due.
        let date = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        orchestrator.run_scheduled_pass(date).await;

        let summary = time::timeout(Duration::from_secs(5), async {
            loop {
                let ev = rx.recv().await.expect("bus closed");
                if ev.kind == EventKind::BackupPassCompleted {
                    return ev.reason;
                }
            }
        })
        .await
        .expect("pass never completed")
        .expect("pass with failures must carry a summary");

        for category in ["daily", "weekly", "monthly"] {
            assert!(
                summary.contains(category),
                "summary should mention {category}: {summary}"
            );
        }
    }
}
