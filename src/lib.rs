//! # servisor
//!
//! **Servisor** supervises a single long-running game-server process and
//! orchestrates coordinated, scheduled backups of its working directory.
//!
//! It launches the server through the platform shell, streams and parses its
//! console output, relays operator commands, recovers from crashes, and runs
//! stop→archive→restart sagas on a daily schedule — with pre-maintenance
//! in-game notifications.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                 ┌─────────────────────────────────────────────────────┐
//!                 │  Daemon (wiring + OS signal handling)               │
//!                 │  - Bus (broadcast events)                           │
//!                 │  - SubscriberSet (fans out to subscribers)          │
//!                 └──────┬──────────────────────────────┬───────────────┘
//!                        ▼                              ▼
//!      ┌──────────────────────────────┐   ┌──────────────────────────────┐
//!      │ ProcessSupervisor            │   │ BackupOrchestrator           │
//!      │  - session state machine     │◄──│  - daily schedule (24h)      │
//!      │  - reader task (stdout+err)  │   │  - calendar predicates       │
//!      │  - stop future (exit signal) │   │  - stop→archive→restart saga │
//!      │  - stats ticker, crash       │   │  - notification timer batch  │
//!      │    recovery (policies)       │   └──────────────┬───────────────┘
//!      └──────────┬───────────────────┘                  ▼
//!                 │ console lines                ┌──────────────────┐
//!                 ▼                              │ ArchiveStore     │
//!        ConsoleEventParser                      │  - zip snapshots │
//!        (players/tps/memory/ready/join/leave)   │  - retention     │
//!                                                └──────────────────┘
//!
//! Event flow:
//!   supervisor / orchestrator ── publish(Event) ──► Bus ──► Daemon listener
//!                                                              │
//!                                                    SubscriberSet::emit
//!                                                   ┌──────────┼──────────┐
//!                                                   ▼          ▼          ▼
//!                                             ConsoleBuffer LogWriter  custom
//!                                             (ring buffer) (log crate) (notifier, ...)
//! ```
//!
//! ### Lifecycle
//! ```text
//! start(command) ──► Stopped → Starting → Running
//!                      │  reader task drains combined stdout/stderr
//!                      │  each line: ConsoleLine event → parse → stats/events
//!                      ▼
//! stop() ──► Stopping: "stop" line to stdin, forced-kill deadline (60s)
//!                      ▼
//!            reader observes EOF → reap child → Stopped
//!              ├─ resolve StopFuture (exactly once)
//!              └─ no stop requested? → crash → relaunch after backoff
//!
//! create_backup(category):
//!   running? ── stop() ── await StopFuture ── archive ── restart
//!   stopped? ── archive
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types                                  |
//! |-------------------|----------------------------------------------------------|--------------------------------------------|
//! | **Supervision**   | One process session: start/stop/command relay/stats.     | [`ProcessSupervisor`], [`StopFuture`]      |
//! | **Parsing**       | Console line classification and derived stats.           | [`ConsoleEvent`], [`StatsSnapshot`]        |
//! | **Backups**       | Zip snapshots, retention, schedule, coordination.        | [`ArchiveStore`], [`BackupOrchestrator`]   |
//! | **Policies**      | Crash-restart gating and relaunch backoff.               | [`RestartPolicy`], [`BackoffPolicy`]       |
//! | **Subscriber API**| Hook into runtime events (console sinks, notifiers).     | [`Subscribe`], [`SubscriberSet`]           |
//! | **Errors**        | Typed errors per component boundary.                     | [`ProcessError`], [`ArchiveError`], [`OrchestratorError`] |
//!
//! ## Example
//! ```no_run
//! use servisor::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let mut cfg = Config::default();
//!     cfg.launch.jar = "/srv/mc/server.jar".into();
//!     cfg.launch.auto_start = true;
//!
//!     // Wires bus, supervisor, orchestrator, and the built-in subscribers;
//!     // runs until SIGINT/SIGTERM, then stops the server gracefully.
//!     Daemon::builder(cfg).build().run().await
//! }
//! ```

mod archive;
mod backup;
mod config;
mod console;
mod daemon;
mod error;
mod events;
mod policies;
mod process;
mod subscribers;

// ---- Public re-exports ----

pub use archive::{ArchiveRecord, ArchiveStore, BackupCategory};
pub use backup::BackupOrchestrator;
pub use config::{
    BackupConfig, CategoryPolicy, Config, LaunchConfig, NoticeConfig, NoticeOffset, ProcessConfig,
};
pub use console::parser;
pub use console::{ConsoleEvent, StatsSnapshot, StatsTracker};
pub use daemon::{Daemon, DaemonBuilder};
pub use error::{ArchiveError, OrchestratorError, ProcessError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy, RestartPolicy};
pub use process::{ProcessState, ProcessSupervisor, StopFuture};
pub use subscribers::{ConsoleBuffer, LogWriter, Subscribe, SubscriberSet};
