//! # ConsoleBuffer — bounded ring buffer of console lines.
//!
//! Keeps the most recent console output (raw server lines plus synthesized
//! status lines) so a late subscriber — e.g. a web console that just
//! connected — can drain the backlog on connect. Oldest entries are evicted
//! first once the capacity is reached.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Default number of retained lines.
const DEFAULT_CAPACITY: usize = 5_000;

/// Stateful subscriber retaining the last N console lines.
pub struct ConsoleBuffer {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl ConsoleBuffer {
    /// Creates a buffer with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a buffer retaining at most `capacity` lines (min 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1_024))),
        }
    }

    /// Copies out the retained lines, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .expect("console buffer lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Number of retained lines.
    pub fn len(&self) -> usize {
        self.lines.lock().expect("console buffer lock poisoned").len()
    }

    /// True when nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all retained lines.
    pub fn clear(&self) {
        self.lines
            .lock()
            .expect("console buffer lock poisoned")
            .clear();
    }

    fn push(&self, line: &str) {
        let mut lines = self.lines.lock().expect("console buffer lock poisoned");
        while lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.to_string());
    }
}

impl Default for ConsoleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Subscribe for ConsoleBuffer {
    async fn on_event(&self, event: &Event) {
        if event.kind == EventKind::ConsoleLine {
            if let Some(line) = event.line.as_deref() {
                self.push(line);
            }
        }
    }

    fn name(&self) -> &'static str {
        "console-buffer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn retains_console_lines_in_order() {
        let buffer = ConsoleBuffer::with_capacity(10);
        for i in 0..3 {
            buffer.on_event(&Event::console(format!("line {i}"))).await;
        }
        assert_eq!(buffer.snapshot(), vec!["line 0", "line 1", "line 2"]);
    }

    #[tokio::test]
    async fn evicts_oldest_first_at_capacity() {
        let buffer = ConsoleBuffer::with_capacity(2);
        for i in 0..4 {
            buffer.on_event(&Event::console(format!("line {i}"))).await;
        }
        assert_eq!(buffer.snapshot(), vec!["line 2", "line 3"]);
    }

    #[tokio::test]
    async fn ignores_non_console_events() {
        let buffer = ConsoleBuffer::new();
        buffer.on_event(&Event::new(EventKind::ServerStarted)).await;
        assert!(buffer.is_empty());
    }
}
