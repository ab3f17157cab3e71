//! Process supervision: the session state machine and its I/O.
//!
//! Internal modules:
//! - [`state`]: the four-state lifecycle and the resolve-once [`StopFuture`];
//! - [`supervisor`]: spawning, reading, command relay, stats polling, crash
//!   recovery.
//!
//! The public API from this module is [`ProcessSupervisor`] plus the types
//! its signatures expose.

mod state;
mod supervisor;

pub use state::{ProcessState, StopFuture};
pub use supervisor::ProcessSupervisor;
