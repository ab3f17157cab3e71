//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the process supervisor, the
//! backup orchestrator, and the daemon.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] — event classification and payload metadata
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ProcessSupervisor` (console lines, lifecycle, stats),
//!   `BackupOrchestrator` (backup/restore/notice progress), `Daemon` (shutdown),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumer**: the daemon's subscriber listener, which fans events out to
//!   the [`SubscriberSet`](crate::SubscriberSet).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
