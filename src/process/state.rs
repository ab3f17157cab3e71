//! # Session state machine and the stop future.
//!
//! [`ProcessState`] is the four-state lifecycle of the supervised process.
//! Guards enforced by the supervisor:
//!
//! ```text
//! start        valid only in Stopped          → Starting → Running
//! send_command valid only in Running
//! stop         no-op outside Running/Starting → Stopping → Stopped
//! ```
//!
//! [`StopFuture`] is the single synchronization point the orchestrator
//! depends on: it resolves exactly once, on the first terminal event (natural
//! exit or forced kill), never earlier. Every `stop()` call during one
//! shutdown observes the same underlying signal.

use tokio_util::sync::CancellationToken;

/// Lifecycle state of the supervised process session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// No session; `start` is allowed.
    Stopped,
    /// A session is being created (process spawn in progress).
    Starting,
    /// The process is live; commands may be sent.
    Running,
    /// A stop was requested; waiting for exit (graceful or forced).
    Stopping,
}

impl ProcessState {
    /// True while a session exists (anything but `Stopped`).
    #[inline]
    pub fn is_active(self) -> bool {
        !matches!(self, ProcessState::Stopped)
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ProcessState::Stopped => "Stopped",
            ProcessState::Starting => "Starting",
            ProcessState::Running => "Running",
            ProcessState::Stopping => "Stopping",
        })
    }
}

/// Awaitable handle resolving when process exit is observed.
///
/// Backed by the session's cancellation token: the reader task cancels it
/// exactly once when end-of-stream is observed and the session is torn down.
/// Cheap to obtain; waiting consumes the handle.
#[derive(Debug, Clone)]
pub struct StopFuture {
    exited: CancellationToken,
}

impl StopFuture {
    /// Handle over a live session's exit signal.
    pub(crate) fn pending(exited: CancellationToken) -> Self {
        Self { exited }
    }

    /// Already-resolved handle, for `stop()` with no session.
    pub(crate) fn ready() -> Self {
        let exited = CancellationToken::new();
        exited.cancel();
        Self { exited }
    }

    /// True once exit has been observed.
    pub fn is_complete(&self) -> bool {
        self.exited.is_cancelled()
    }

    /// Waits until exit is observed.
    pub async fn wait(self) {
        self.exited.cancelled_owned().await;
    }
}
