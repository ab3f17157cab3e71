//! # Derived server stats.
//!
//! [`StatsTracker`] accumulates the latest values parsed from the console
//! (player count, TPS, memory) and the session start time. Values follow a
//! replace-never-merge policy: every observation overwrites the previous one,
//! and everything resets to the [`NOT_AVAILABLE`] sentinel when a new session
//! starts.
//!
//! [`StatsSnapshot`] is a point-in-time read: recomputed per request, never
//! persisted.

use std::sync::RwLock;
use std::time::Instant;

use chrono::Local;

use super::parser::NOT_AVAILABLE;

/// Point-in-time view of the supervised server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Latest parsed online-player count, or `"N/A"`.
    pub online_players: String,
    /// Latest parsed TPS sample, or `"N/A"`.
    pub tps: String,
    /// Latest parsed memory usage, or `"N/A"`.
    pub memory: String,
    /// Formatted uptime of the current session, or `"N/A"`.
    pub uptime: String,
    /// `"Running"` or `"Stopped"`.
    pub status: String,
    /// Wall-clock timestamp of the snapshot, `yyyy-MM-dd HH:mm:ss`.
    pub timestamp: String,
}

impl StatsSnapshot {
    /// Renders the snapshot as the multi-line console status block.
    pub fn to_console_block(&self) -> String {
        format!(
            "Server Stats [{}]\nPlayers: {}\nTPS: {}\nMemory: {}\nUptime: {}",
            self.timestamp, self.online_players, self.tps, self.memory, self.uptime
        )
    }
}

#[derive(Debug)]
struct Inner {
    online_players: String,
    tps: String,
    memory: String,
    started_at: Option<Instant>,
}

impl Inner {
    fn reset(&mut self) {
        self.online_players = NOT_AVAILABLE.to_string();
        self.tps = NOT_AVAILABLE.to_string();
        self.memory = NOT_AVAILABLE.to_string();
        self.started_at = None;
    }
}

/// Thread-safe accumulator for console-derived stats.
#[derive(Debug)]
pub struct StatsTracker {
    inner: RwLock<Inner>,
}

impl StatsTracker {
    /// Creates a tracker with every value at the `"N/A"` sentinel.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                online_players: NOT_AVAILABLE.to_string(),
                tps: NOT_AVAILABLE.to_string(),
                memory: NOT_AVAILABLE.to_string(),
                started_at: None,
            }),
        }
    }

    /// Clears all derived values and the session start time.
    pub fn reset(&self) {
        self.inner.write().expect("stats lock poisoned").reset();
    }

    /// Records the start instant of a new session.
    pub fn mark_started(&self, at: Instant) {
        self.inner.write().expect("stats lock poisoned").started_at = Some(at);
    }

    /// Clears the session start time (uptime reads `"N/A"` afterwards).
    pub fn mark_stopped(&self) {
        self.inner.write().expect("stats lock poisoned").started_at = None;
    }

    /// Replaces the online-player count.
    pub fn set_online_players(&self, value: String) {
        self.inner.write().expect("stats lock poisoned").online_players = value;
    }

    /// Replaces the TPS sample.
    pub fn set_tps(&self, value: String) {
        self.inner.write().expect("stats lock poisoned").tps = value;
    }

    /// Replaces the memory usage value.
    pub fn set_memory(&self, value: String) {
        self.inner.write().expect("stats lock poisoned").memory = value;
    }

    /// Produces a snapshot with the given status string.
    pub fn snapshot(&self, running: bool) -> StatsSnapshot {
        let inner = self.inner.read().expect("stats lock poisoned");
        StatsSnapshot {
            online_players: inner.online_players.clone(),
            tps: inner.tps.clone(),
            memory: inner.memory.clone(),
            uptime: match inner.started_at {
                Some(at) => format_duration(at.elapsed().as_secs()),
                None => NOT_AVAILABLE.to_string(),
            },
            status: if running { "Running" } else { "Stopped" }.to_string(),
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats whole seconds as `[Nd ]HH:MM:SS`.
fn format_duration(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    if days > 0 {
        format!("{days}d {hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_tracker_reads_not_available() {
        let tracker = StatsTracker::new();
        let snap = tracker.snapshot(false);
        assert_eq!(snap.online_players, NOT_AVAILABLE);
        assert_eq!(snap.tps, NOT_AVAILABLE);
        assert_eq!(snap.memory, NOT_AVAILABLE);
        assert_eq!(snap.uptime, NOT_AVAILABLE);
        assert_eq!(snap.status, "Stopped");
    }

    #[test]
    fn observations_replace_previous_values() {
        let tracker = StatsTracker::new();
        tracker.set_online_players("3".into());
        tracker.set_online_players("7".into());
        assert_eq!(tracker.snapshot(true).online_players, "7");
    }

    #[test]
    fn reset_returns_to_sentinel() {
        let tracker = StatsTracker::new();
        tracker.set_tps("19.98".into());
        tracker.mark_started(Instant::now());
        tracker.reset();
        let snap = tracker.snapshot(false);
        assert_eq!(snap.tps, NOT_AVAILABLE);
        assert_eq!(snap.uptime, NOT_AVAILABLE);
    }

    #[test]
    fn uptime_is_formatted_once_started() {
        let tracker = StatsTracker::new();
        tracker.mark_started(Instant::now());
        let snap = tracker.snapshot(true);
        assert_ne!(snap.uptime, NOT_AVAILABLE);
        assert!(snap.uptime.contains(':'));
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(0), "00:00:00");
        assert_eq!(format_duration(3_661), "01:01:01");
        assert_eq!(format_duration(90_061), "1d 01:01:01");
    }
}
