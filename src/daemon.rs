//! # Daemon: wires the components together and drives shutdown.
//!
//! The [`Daemon`] owns the event bus, the [`SubscriberSet`], the process
//! supervisor, and the backup orchestrator. It arms the backup schedule,
//! optionally auto-starts the server, and handles OS termination signals.
//!
//! ## High-level architecture
//! ```text
//! Config ──► Daemon::builder(cfg).with_subscribers(...).build()
//!               ├─ Bus
//!               ├─ SubscriberSet (user subs + ConsoleBuffer + LogWriter)
//!               │     ▲ fed by the subscriber listener (Bus → emit)
//!               ├─ ProcessSupervisor (cfg.process)
//!               └─ BackupOrchestrator (cfg.backup, ArchiveStore at the
//!                  backup root resolved against the server directory)
//!
//! run():
//!   ├─ orchestrator.start_schedule()        (if backups enabled)
//!   ├─ supervisor.start(launch command)     (if auto_start)
//!   ├─ wait_for_shutdown_signal()
//!   └─ on signal:
//!        ├─ publish ShutdownRequested
//!        ├─ orchestrator.shutdown()         (schedule + notices cancelled)
//!        ├─ supervisor.stop() bounded by cfg.grace
//!        └─ drain subscriber queues
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time;

use crate::archive::ArchiveStore;
use crate::backup::BackupOrchestrator;
use crate::config::Config;
use crate::events::{Bus, Event, EventKind};
use crate::process::ProcessSupervisor;
use crate::subscribers::{ConsoleBuffer, LogWriter, Subscribe, SubscriberSet};

/// Builder for constructing a [`Daemon`] with optional extra subscribers.
pub struct DaemonBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl DaemonBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets additional event subscribers (notification transports, web
    /// console sinks, metrics, ...).
    ///
    /// The built-in [`ConsoleBuffer`] and [`LogWriter`] are always present.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Builds the daemon and starts the subscriber fan-out.
    ///
    /// Must be called within a Tokio runtime (the subscriber workers and the
    /// bus listener are spawned here).
    pub fn build(self) -> Daemon {
        let cfg = self.cfg;
        let bus = Bus::new(cfg.bus_capacity);

        let console = Arc::new(ConsoleBuffer::new());
        let mut subscribers = self.subscribers;
        subscribers.push(Arc::clone(&console) as Arc<dyn Subscribe>);
        subscribers.push(Arc::new(LogWriter::new()));
        let subs = Arc::new(SubscriberSet::new(subscribers));

        let supervisor = ProcessSupervisor::new(cfg.process.clone(), bus.clone());

        let server_dir = cfg.launch.working_dir();
        let backup_root = if cfg.backup.root.is_absolute() {
            cfg.backup.root.clone()
        } else {
            server_dir.join(&cfg.backup.root)
        };
        let store = Arc::new(ArchiveStore::new(server_dir, backup_root));
        let orchestrator = BackupOrchestrator::new(
            cfg.backup.clone(),
            Arc::clone(&supervisor),
            store,
            bus.clone(),
        );

        let listener = spawn_subscriber_listener(&bus, Arc::clone(&subs));
        Daemon {
            cfg,
            bus,
            subs,
            console,
            supervisor,
            orchestrator,
            listener,
        }
    }
}

/// Long-running service wiring for one supervised game server.
pub struct Daemon {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    console: Arc<ConsoleBuffer>,
    supervisor: Arc<ProcessSupervisor>,
    orchestrator: Arc<BackupOrchestrator>,
    listener: JoinHandle<()>,
}

impl Daemon {
    /// Starts building a daemon from a configuration.
    pub fn builder(cfg: Config) -> DaemonBuilder {
        DaemonBuilder::new(cfg)
    }

    /// The shared event bus.
    pub fn bus(&self) -> Bus {
        self.bus.clone()
    }

    /// The process supervisor.
    pub fn supervisor(&self) -> Arc<ProcessSupervisor> {
        Arc::clone(&self.supervisor)
    }

    /// The backup orchestrator.
    pub fn orchestrator(&self) -> Arc<BackupOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    /// The retained console backlog for late subscribers.
    pub fn console(&self) -> Arc<ConsoleBuffer> {
        Arc::clone(&self.console)
    }

    /// The configuration the daemon was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Runs until an OS termination signal, then shuts down gracefully.
    ///
    /// Arms the backup schedule (if enabled) and auto-starts the server (if
    /// configured). On signal: cancels schedule and notification timers,
    /// requests a supervised stop bounded by `cfg.grace`, and drains the
    /// subscriber queues.
    pub async fn run(self) -> std::io::Result<()> {
        if self.cfg.backup.enabled {
            self.orchestrator.start_schedule();
        }
        if self.cfg.launch.auto_start {
            let command = self.cfg.launch.command();
            if let Err(err) = self.supervisor.start(command).await {
                log::error!("failed to auto-start server: {err}");
            }
        }

        wait_for_shutdown_signal().await?;
        self.bus.publish(Event::new(EventKind::ShutdownRequested));

        self.orchestrator.shutdown();
        let stop = self.supervisor.stop().await;
        if time::timeout(self.cfg.grace, stop.wait()).await.is_err() {
            log::warn!(
                "server did not stop within the {:?} grace period",
                self.cfg.grace
            );
        }

        // Stop the listener first so the subscriber set can be drained.
        self.listener.abort();
        let _ = self.listener.await;
        if let Some(set) = Arc::into_inner(self.subs) {
            set.shutdown().await;
        }
        Ok(())
    }
}

/// Subscribes to the bus and forwards events to the subscriber set.
///
/// A lagged receiver skips the overwritten events and keeps going; only a
/// closed channel ends the listener.
fn spawn_subscriber_listener(bus: &Bus, subs: Arc<SubscriberSet>) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => subs.emit(&ev),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("subscriber listener lagged; skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Waits for a termination signal.
///
/// Unix: SIGINT, SIGTERM, SIGQUIT, or Ctrl-C. Elsewhere: Ctrl-C.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal (Ctrl-C).
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn built_daemon_feeds_console_lines_to_the_buffer() {
        let mut cfg = Config::default();
        cfg.backup.enabled = false;
        let daemon = Daemon::builder(cfg).build();

        daemon.bus().publish(Event::console("line from the server"));

        // Fan-out is asynchronous; give the listener and worker a moment.
        let console = daemon.console();
        for _ in 0..50 {
            if !console.is_empty() {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(console.snapshot(), vec!["line from the server"]);
    }

    #[tokio::test]
    async fn builder_accepts_extra_subscribers() {
        use crate::events::EventKind;
        use async_trait::async_trait;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Counter(AtomicUsize);

        #[async_trait]
        impl Subscribe for Counter {
            async fn on_event(&self, event: &Event) {
                if event.kind == EventKind::ServerReady {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
            }
            fn name(&self) -> &'static str {
                "counter"
            }
        }

        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let mut cfg = Config::default();
        cfg.backup.enabled = false;
        let daemon = Daemon::builder(cfg)
            .with_subscriber(Arc::clone(&counter) as Arc<dyn Subscribe>)
            .build();

        daemon.bus().publish(Event::new(EventKind::ServerReady));
        for _ in 0..50 {
            if counter.0.load(Ordering::SeqCst) == 1 {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
