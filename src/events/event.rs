//! # Runtime events emitted by the supervisor and the backup orchestrator.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Console events**: raw and synthesized server console lines
//! - **Lifecycle events**: process state flow (starting, ready, stopped, crashed)
//! - **Backup events**: archive/restore/prune progress and outcomes
//! - **Notice events**: pre-maintenance in-game notifications
//!
//! The [`Event`] struct carries additional metadata such as timestamps, the
//! console line, player name, backup category, and archive filename.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use servisor::{BackupCategory, Event, EventKind};
//!
//! let ev = Event::new(EventKind::BackupFailed)
//!     .with_category(BackupCategory::Daily)
//!     .with_reason("disk full");
//!
//! assert_eq!(ev.kind, EventKind::BackupFailed);
//! assert_eq!(ev.reason.as_deref(), Some("disk full"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::archive::BackupCategory;
use crate::console::StatsSnapshot;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Console events ===
    /// One console line, verbatim from the server or synthesized by a component.
    ///
    /// Sets: `line`.
    ConsoleLine,

    // === Process lifecycle events ===
    /// A session is being started.
    ///
    /// Sets: `line` (the launch command).
    ServerStarting,

    /// The process was spawned and the session is live.
    ServerStarted,

    /// The server printed its startup-complete marker.
    ServerReady,

    /// An operator/orchestrator stop was requested and the graceful
    /// shutdown line was sent.
    ServerStopping,

    /// Process exit was observed and the session was torn down.
    ServerStopped,

    /// Process exit was observed with no prior stop request.
    ///
    /// Sets: `reason` (exit status, when known).
    ServerCrashed,

    /// An automatic restart was scheduled after a crash.
    ///
    /// Sets: `delay_ms`, `attempt`.
    RestartScheduled,

    /// A player logged in. Sets: `player`.
    PlayerJoined,

    /// A player disconnected. Sets: `player`.
    PlayerLeft,

    /// A periodic stats poll completed. Sets: `stats`.
    StatsSampled,

    // === Backup events ===
    /// A scheduled backup pass started.
    BackupPassStarted,

    /// A scheduled backup pass finished.
    ///
    /// Sets: `reason` (summary of per-category failures, if any).
    BackupPassCompleted,

    /// A backup of one category started. Sets: `category`.
    BackupStarted,

    /// A backup archive was written. Sets: `category`, `file`.
    BackupCreated,

    /// A backup attempt failed. Sets: `category`, `reason`.
    BackupFailed,

    /// Retention pruning deleted old archives.
    ///
    /// Sets: `category`, `reason` (the deleted names).
    BackupPruned,

    /// An archive was deleted by operator request. Sets: `category`, `file`.
    BackupDeleted,

    /// A restore started. Sets: `category`, `file`.
    RestoreStarted,

    /// A restore completed and files were copied over the server directory.
    ///
    /// Sets: `category`, `file`.
    RestoreCompleted,

    /// A restore failed; the server is deliberately left stopped.
    ///
    /// Sets: `category`, `file`, `reason`.
    RestoreFailed,

    // === Notice events ===
    /// A batch of pre-maintenance notification timers was armed.
    ///
    /// Sets: `attempt` (number of timers armed).
    NoticeScheduled,

    /// One notification fired and was relayed in-game. Sets: `line`.
    NoticeSent,

    // === Runtime events ===
    /// The daemon observed an OS termination signal.
    ShutdownRequested,

    /// A subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason`.
    SubscriberOverflow,

    /// A subscriber panicked during event processing. Sets: `reason`.
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Console line or message text.
    pub line: Option<Arc<str>>,
    /// Player name, for join/leave events.
    pub player: Option<Arc<str>>,
    /// Backup category, for backup/restore events.
    pub category: Option<BackupCategory>,
    /// Archive filename, for backup/restore events.
    pub file: Option<Arc<str>>,
    /// Human-readable reason (errors, summaries, exit statuses).
    pub reason: Option<Arc<str>>,
    /// Delay before a scheduled action, in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Attempt or item count, depending on the kind.
    pub attempt: Option<u32>,
    /// Stats snapshot, for [`EventKind::StatsSampled`].
    pub stats: Option<StatsSnapshot>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next
    /// sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            line: None,
            player: None,
            category: None,
            file: None,
            reason: None,
            delay_ms: None,
            attempt: None,
            stats: None,
        }
    }

    /// Attaches a console line or message text.
    #[inline]
    pub fn with_line(mut self, line: impl Into<Arc<str>>) -> Self {
        self.line = Some(line.into());
        self
    }

    /// Attaches a player name.
    #[inline]
    pub fn with_player(mut self, player: impl Into<Arc<str>>) -> Self {
        self.player = Some(player.into());
        self
    }

    /// Attaches a backup category.
    #[inline]
    pub fn with_category(mut self, category: BackupCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Attaches an archive filename.
    #[inline]
    pub fn with_file(mut self, file: impl Into<Arc<str>>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches an attempt or item count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a stats snapshot.
    #[inline]
    pub fn with_stats(mut self, stats: StatsSnapshot) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Creates a console-line event.
    #[inline]
    pub fn console(line: impl Into<Arc<str>>) -> Self {
        Event::new(EventKind::ConsoleLine).with_line(line)
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} panic={info}"))
    }
}
