//! Crash-recovery policies.
//!
//! This module groups the knobs that control **if** a crashed server is
//! relaunched and **how long** to wait before relaunching.
//!
//! ## Contents
//! - [`RestartPolicy`] whether a crash schedules a relaunch (never / on-crash)
//! - [`BackoffPolicy`] how relaunch delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy for the delay
//!
//! ## Quick wiring
//! ```text
//! ProcessConfig { restart: RestartPolicy, crash_backoff: BackoffPolicy }
//!      └─► process::ProcessSupervisor uses:
//!           - restart to decide whether an unexpected exit relaunches
//!           - crash_backoff.next(crash_count) to schedule the relaunch
//! ```
//!
//! ## Defaults
//! - `RestartPolicy::OnCrash` — a crashed server comes back by itself.
//! - `BackoffPolicy::default()` → first=5s, factor=1.0 (constant), max=300s.
//! - `JitterPolicy::None`.

mod backoff;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::RestartPolicy;
