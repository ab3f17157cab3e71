//! # Event subscribers: collaborators fed by the bus.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`]
//! fan-out, and the built-in collaborators the daemon wires up by default.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   supervisor/orchestrator ── publish(Event) ──► Bus ──► Daemon listener
//!                                                            │
//!                                                   SubscriberSet::emit(&Event)
//!                                                  ┌─────────┼──────────────┐
//!                                                  ▼         ▼              ▼
//!                                            ConsoleBuffer  LogWriter  custom (notifier, ...)
//! ```
//!
//! ## Subscriber types
//! - **Passive subscribers** — observe and react (LogWriter, a Telegram
//!   notifier, a WebSocket console sink)
//! - **Stateful subscribers** — maintain state from the stream (ConsoleBuffer)
//!
//! A notification transport is just another `Subscribe` implementation; its
//! delivery failures stay inside its worker and can never fail the operation
//! that published the event.

mod console;
mod log;
mod set;
mod subscribe;

pub use console::ConsoleBuffer;
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
