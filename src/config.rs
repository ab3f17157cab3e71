//! # Runtime configuration.
//!
//! Plain construction-time settings for the daemon and its components. An
//! external settings layer (properties file, web UI, ...) owns persistence
//! and hands a [`Config`] in; the core never parses files itself.
//!
//! Config is used in three ways:
//! 1. **Daemon wiring**: `Daemon::builder(config)` derives the supervisor,
//!    archive store, and orchestrator from it.
//! 2. **Process control**: [`ProcessConfig`] carries the stop line, timers,
//!    and crash policy.
//! 3. **Backup planning**: [`BackupConfig`] carries the root, time-of-day,
//!    per-category retention, and notification settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;

use crate::archive::BackupCategory;
use crate::policies::{BackoffPolicy, RestartPolicy};

/// Top-level configuration for the daemon.
#[derive(Clone, Debug)]
pub struct Config {
    /// How the server process is launched.
    pub launch: LaunchConfig,
    /// Process-control knobs (stop line, timers, crash policy).
    pub process: ProcessConfig,
    /// Backup root, schedule, retention, and notifications.
    pub backup: BackupConfig,
    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
    /// Maximum wait for a graceful server stop during daemon shutdown.
    pub grace: Duration,
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `grace = 90s` (the forced-kill deadline plus slack)
    fn default() -> Self {
        Self {
            launch: LaunchConfig::default(),
            process: ProcessConfig::default(),
            backup: BackupConfig::default(),
            bus_capacity: 1024,
            grace: Duration::from_secs(90),
        }
    }
}

/// How the server process is launched.
#[derive(Clone, Debug)]
pub struct LaunchConfig {
    /// Path to the server jar. Its parent directory is the working directory
    /// that gets archived.
    pub jar: PathBuf,
    /// Maximum JVM heap, gigabytes (`-Xmx`).
    pub heap_max_gb: u32,
    /// Initial JVM heap, gigabytes (`-Xms`).
    pub heap_min_gb: u32,
    /// Start the server as soon as the daemon runs.
    pub auto_start: bool,
}

impl LaunchConfig {
    /// Assembles the launch command line.
    pub fn command(&self) -> String {
        format!(
            "java -Xmx{}G -Xms{}G -jar {} nogui",
            self.heap_max_gb,
            self.heap_min_gb,
            self.jar.display()
        )
    }

    /// The server's working directory, implied by the jar path.
    pub fn working_dir(&self) -> PathBuf {
        match self.jar.parent() {
            Some(parent) if parent != Path::new("") => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            jar: PathBuf::from("server.jar"),
            heap_max_gb: 4,
            heap_min_gb: 2,
            auto_start: false,
        }
    }
}

/// Process-control knobs.
#[derive(Clone, Debug)]
pub struct ProcessConfig {
    /// The server's own graceful-shutdown console command.
    pub stop_command: String,
    /// How long after a stop request before the process is killed forcibly.
    pub kill_deadline: Duration,
    /// Wait after issuing the info commands before sampling their parsed
    /// output (their responses arrive asynchronously via the reader).
    pub settle_delay: Duration,
    /// Period of the stats poll.
    pub poll_interval: Duration,
    /// Whether an unexpected exit relaunches the server.
    pub restart: RestartPolicy,
    /// Delay computation between crash and relaunch.
    pub crash_backoff: BackoffPolicy,
}

impl Default for ProcessConfig {
    /// Defaults match the server's historical behavior: `stop` as the
    /// graceful line, a 60 s kill deadline, a 5 s settle delay, a 3 h poll,
    /// and crash relaunch at a constant 5 s.
    fn default() -> Self {
        Self {
            stop_command: "stop".to_string(),
            kill_deadline: Duration::from_secs(60),
            settle_delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(3 * 3600),
            restart: RestartPolicy::default(),
            crash_backoff: BackoffPolicy::default(),
        }
    }
}

/// Enable/retention pair for one backup category.
#[derive(Clone, Copy, Debug)]
pub struct CategoryPolicy {
    /// Whether this category participates in scheduled passes (and pruning).
    pub enabled: bool,
    /// Retention cap: only the `max_kept` most recently modified archives
    /// survive pruning.
    pub max_kept: usize,
}

/// Backup root, schedule, retention, and notification settings.
#[derive(Clone, Debug)]
pub struct BackupConfig {
    /// Master switch for the daily schedule.
    pub enabled: bool,
    /// Backup root directory; category subdirectories live under it.
    pub root: PathBuf,
    /// Local time of day the scheduled pass runs.
    pub time_of_day: NaiveTime,
    /// Manual backups (operator-triggered; never scheduled).
    pub manual: CategoryPolicy,
    /// Daily backups.
    pub daily: CategoryPolicy,
    /// Weekly backups (ISO Sunday).
    pub weekly: CategoryPolicy,
    /// Monthly backups (day-of-month 1).
    pub monthly: CategoryPolicy,
    /// Pre-maintenance in-game notifications.
    pub notices: NoticeConfig,
}

impl BackupConfig {
    /// Returns the policy for a category.
    pub fn policy(&self, category: BackupCategory) -> CategoryPolicy {
        match category {
            BackupCategory::Manual => self.manual,
            BackupCategory::Daily => self.daily,
            BackupCategory::Weekly => self.weekly,
            BackupCategory::Monthly => self.monthly,
        }
    }
}

impl Default for BackupConfig {
    /// Defaults: schedule at 04:00, daily×7 / weekly×4 / monthly×6 retained,
    /// manual backups capped at 10.
    fn default() -> Self {
        Self {
            enabled: true,
            root: PathBuf::from("backups"),
            time_of_day: NaiveTime::from_hms_opt(4, 0, 0).expect("valid time"),
            manual: CategoryPolicy {
                enabled: true,
                max_kept: 10,
            },
            daily: CategoryPolicy {
                enabled: true,
                max_kept: 7,
            },
            weekly: CategoryPolicy {
                enabled: true,
                max_kept: 4,
            },
            monthly: CategoryPolicy {
                enabled: true,
                max_kept: 6,
            },
            notices: NoticeConfig::default(),
        }
    }
}

/// Pre-maintenance notification settings.
#[derive(Clone, Debug)]
pub struct NoticeConfig {
    /// Whether notification timers are armed at all.
    pub enabled: bool,
    /// Offsets before the maintenance target, largest first.
    pub offsets: Vec<NoticeOffset>,
    /// Message template; `{time}` is replaced with the offset label.
    pub template: String,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            offsets: ["1h", "30m", "10m", "5m", "1m"]
                .iter()
                .filter_map(|s| NoticeOffset::parse(s))
                .collect(),
            template: "Server will restart for maintenance in {time}".to_string(),
        }
    }
}

/// One notification offset: a human label (kept for the message template) and
/// its duration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoticeOffset {
    /// Label substituted into the template, e.g. `"30m"`.
    pub label: String,
    /// Distance before the maintenance target.
    pub duration: Duration,
}

impl NoticeOffset {
    /// Creates an offset with an explicit label.
    pub fn new(label: impl Into<String>, duration: Duration) -> Self {
        Self {
            label: label.into(),
            duration,
        }
    }

    /// Parses `"<n>h"` or `"<n>m"` (case-insensitive), as entered in the
    /// settings UI. Anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        let (digits, unit_secs) = if let Some(v) = lower.strip_suffix('h') {
            (v, 3_600)
        } else if let Some(v) = lower.strip_suffix('m') {
            (v, 60)
        } else {
            return None;
        };
        let n: u64 = digits.parse().ok()?;
        Some(Self::new(trimmed, Duration::from_secs(n * unit_secs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_command_includes_heap_and_jar() {
        let launch = LaunchConfig {
            jar: PathBuf::from("/srv/mc/server.jar"),
            heap_max_gb: 8,
            heap_min_gb: 4,
            auto_start: false,
        };
        assert_eq!(
            launch.command(),
            "java -Xmx8G -Xms4G -jar /srv/mc/server.jar nogui"
        );
        assert_eq!(launch.working_dir(), PathBuf::from("/srv/mc"));
    }

    #[test]
    fn bare_jar_name_implies_current_dir() {
        let launch = LaunchConfig::default();
        assert_eq!(launch.working_dir(), PathBuf::from("."));
    }

    #[test]
    fn notice_offset_parsing() {
        assert_eq!(
            NoticeOffset::parse("3h"),
            Some(NoticeOffset::new("3h", Duration::from_secs(3 * 3600)))
        );
        assert_eq!(
            NoticeOffset::parse(" 30M "),
            Some(NoticeOffset::new("30M", Duration::from_secs(1800)))
        );
        assert_eq!(NoticeOffset::parse("90s"), None);
        assert_eq!(NoticeOffset::parse("h"), None);
        assert_eq!(NoticeOffset::parse(""), None);
    }
}
