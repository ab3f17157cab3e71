//! # Restart policy for the supervised process.
//!
//! [`RestartPolicy`] determines whether the server is restarted after its
//! process exits **without** a prior stop request (a crash). Operator- and
//! orchestrator-initiated stops never trigger a restart, regardless of policy.
//!
//! ```text
//! RestartPolicy::Never    → a crashed server stays down
//! RestartPolicy::OnCrash  → a crashed server is relaunched with the same
//!                           command after the configured backoff delay
//! ```

/// Policy controlling whether the server is relaunched after an unexpected exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Never relaunch: a crash leaves the server stopped.
    Never,
    /// Relaunch after every crash (default). The delay between the observed
    /// exit and the relaunch is computed by [`BackoffPolicy`](crate::BackoffPolicy).
    OnCrash,
}

impl RestartPolicy {
    /// True if a crash under this policy schedules a relaunch.
    #[inline]
    pub fn restarts_on_crash(self) -> bool {
        matches!(self, RestartPolicy::OnCrash)
    }
}

impl Default for RestartPolicy {
    /// Returns [`RestartPolicy::OnCrash`].
    fn default() -> Self {
        RestartPolicy::OnCrash
    }
}
