//! # Console line classifier.
//!
//! Stateless recognition of the handful of server console lines the
//! supervisor cares about. Classification is substring-based, matching the
//! way the server actually prints, e.g.:
//!
//! ```text
//! [12:00:01] [Server thread/INFO]: There are 3 of a max of 20 players online: a, b, c
//! [12:00:02] [Server thread/INFO]: Current Memory Usage: 2048 MB
//! [12:00:03] [Server thread/INFO]: TPS from last 1m, 5m, 15m: 19.98, 19.92, 19.87
//! [12:00:04] [Server thread/INFO]: Done (12.345s)! For help, type "help"
//! [12:00:05] [Server thread/INFO]: The user steve has successfully logged in.
//! [12:00:06] [Server thread/INFO]: steve lost connection: Disconnected
//! ```
//!
//! Unmatched lines classify to `None`; extraction failures degrade to the
//! [`NOT_AVAILABLE`] sentinel rather than raising errors. The `scan_*` helpers
//! apply the same extraction to a multi-line buffer with
//! most-recent-match-wins semantics.

/// Sentinel used when a value could not be extracted.
pub const NOT_AVAILABLE: &str = "N/A";

const PLAYERS_MARKER: &str = "There are ";
const PLAYERS_SUFFIX: &str = "players online";
const MEMORY_MARKER: &str = "Current Memory Usage:";
const TPS_MARKER: &str = "TPS from last";
const READY_MARKER: &str = "Done (";
const JOIN_PREFIX: &str = "The user ";
const JOIN_SUFFIX: &str = " has successfully logged in.";
const LEAVE_MARKER: &str = " lost connection: Disconnected";

/// Typed event extracted from one console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    /// Online-player count, e.g. `"3"`.
    OnlinePlayers(String),
    /// Memory usage string, trimmed, e.g. `"2048 MB"`.
    Memory(String),
    /// Most recent 1-sample TPS average, e.g. `"19.98"`.
    Tps(String),
    /// The server finished starting up.
    Ready,
    /// A player logged in.
    PlayerJoined(String),
    /// A player disconnected.
    PlayerLeft(String),
}

/// Classifies one console line into a typed event, if it matches any pattern.
pub fn classify(line: &str) -> Option<ConsoleEvent> {
    if line.contains(PLAYERS_MARKER) && line.contains(PLAYERS_SUFFIX) {
        return Some(ConsoleEvent::OnlinePlayers(extract_online_players(line)));
    }
    if line.contains(MEMORY_MARKER) {
        return Some(ConsoleEvent::Memory(extract_memory(line)));
    }
    if line.contains(TPS_MARKER) {
        // Malformed TPS lines (fewer than 3 samples) are ignored entirely.
        return extract_tps(line).map(ConsoleEvent::Tps);
    }
    if line.contains(READY_MARKER) {
        return Some(ConsoleEvent::Ready);
    }
    if let Some(name) = extract_joined(line) {
        return Some(ConsoleEvent::PlayerJoined(name));
    }
    if let Some(name) = extract_left(line) {
        return Some(ConsoleEvent::PlayerLeft(name));
    }
    None
}

/// Scans a multi-line buffer for the latest online-player count.
///
/// Most-recent-match-wins; [`NOT_AVAILABLE`] when no line matches.
pub fn scan_online_players(buffer: &str) -> String {
    for line in buffer.lines().rev() {
        if line.contains(PLAYERS_MARKER) {
            return extract_online_players(line);
        }
    }
    NOT_AVAILABLE.to_string()
}

/// Scans a multi-line buffer for the latest memory usage value.
pub fn scan_memory(buffer: &str) -> String {
    for line in buffer.lines().rev() {
        if line.contains(MEMORY_MARKER) {
            return extract_memory(line);
        }
    }
    NOT_AVAILABLE.to_string()
}

/// Scans a multi-line buffer for the latest TPS sample.
pub fn scan_tps(buffer: &str) -> String {
    for line in buffer.lines().rev() {
        if line.contains(TPS_MARKER) {
            if let Some(tps) = extract_tps(line) {
                return tps;
            }
        }
    }
    NOT_AVAILABLE.to_string()
}

/// Extracts `<N>` from `"... There are <N> ..."`.
fn extract_online_players(line: &str) -> String {
    let Some(idx) = line.find(PLAYERS_MARKER) else {
        return NOT_AVAILABLE.to_string();
    };
    let rest = &line[idx + PLAYERS_MARKER.len()..];
    match rest.split_whitespace().next() {
        Some(count) if !count.is_empty() => count.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Extracts the trimmed value after `"Current Memory Usage:"`.
fn extract_memory(line: &str) -> String {
    let Some(idx) = line.find(MEMORY_MARKER) else {
        return NOT_AVAILABLE.to_string();
    };
    let value = line[idx + MEMORY_MARKER.len()..].trim();
    if value.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        value.to_string()
    }
}

/// Extracts the first of at least three comma-separated TPS samples.
///
/// Returns `None` when the line does not carry three numeric fields, so a
/// malformed line never overwrites a previously observed value.
fn extract_tps(line: &str) -> Option<String> {
    let tail = line.rsplit(':').next()?;
    let cleaned: String = tail
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    let samples: Vec<&str> = cleaned
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if samples.len() >= 3 {
        Some(samples[0].to_string())
    } else {
        None
    }
}

/// Extracts `<name>` from `"The user <name> has successfully logged in."`.
fn extract_joined(line: &str) -> Option<String> {
    let start = line.find(JOIN_PREFIX)? + JOIN_PREFIX.len();
    let end = line[start..].find(JOIN_SUFFIX)? + start;
    let name = line[start..end].trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Extracts `<name>` from `"<name> lost connection: Disconnected"`.
///
/// Any log prefix (`"[..] [..]: "`) before the name is stripped first.
fn extract_left(line: &str) -> Option<String> {
    let end = line.find(LEAVE_MARKER)?;
    let head = &line[..end];
    let name = match head.rfind("]: ") {
        Some(idx) => &head[idx + 3..],
        None => head,
    };
    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = "[12:00:00] [Server thread/INFO]: ";

    #[test]
    fn classifies_online_players() {
        let line = format!("{INFO}There are 3 of a max of 20 players online: a, b, c");
        assert_eq!(
            classify(&line),
            Some(ConsoleEvent::OnlinePlayers("3".into()))
        );
    }

    #[test]
    fn scan_players_takes_most_recent_match() {
        let buffer = format!(
            "{INFO}There are 3 of a max of 20 players online\n\
             {INFO}some chatter\n\
             {INFO}There are 7 of a max of 20 players online"
        );
        assert_eq!(scan_online_players(&buffer), "7");
    }

    #[test]
    fn scan_players_without_marker_is_not_available() {
        assert_eq!(scan_online_players("no players line here"), NOT_AVAILABLE);
    }

    #[test]
    fn classifies_memory() {
        let line = format!("{INFO}Current Memory Usage: 2048 MB  ");
        assert_eq!(classify(&line), Some(ConsoleEvent::Memory("2048 MB".into())));
    }

    #[test]
    fn classifies_tps_first_sample() {
        let line = format!("{INFO}TPS from last 1m, 5m, 15m: 19.98, 19.92, 19.87");
        assert_eq!(classify(&line), Some(ConsoleEvent::Tps("19.98".into())));
    }

    #[test]
    fn tps_with_too_few_samples_is_ignored() {
        let line = format!("{INFO}TPS from last 1m: 19.98, 19.92");
        assert_eq!(classify(&line), None);
        assert_eq!(scan_tps(&line), NOT_AVAILABLE);
    }

    #[test]
    fn classifies_ready_marker() {
        let line = format!("{INFO}Done (12.345s)! For help, type \"help\"");
        assert_eq!(classify(&line), Some(ConsoleEvent::Ready));
    }

    #[test]
    fn classifies_player_joined() {
        let line = format!("{INFO}The user steve has successfully logged in.");
        assert_eq!(
            classify(&line),
            Some(ConsoleEvent::PlayerJoined("steve".into()))
        );
    }

    #[test]
    fn classifies_player_left_with_log_prefix() {
        let line = format!("{INFO}steve lost connection: Disconnected");
        assert_eq!(
            classify(&line),
            Some(ConsoleEvent::PlayerLeft("steve".into()))
        );
    }

    #[test]
    fn unmatched_line_classifies_to_none() {
        assert_eq!(classify("a perfectly ordinary chat line"), None);
    }
}
