//! # ProcessSupervisor: owns the server process and its lifecycle.
//!
//! One supervisor administers at most one [`ProcessSession`] at a time: it
//! spawns the process, reads its combined output, relays operator commands,
//! polls stats, and recovers from crashes.
//!
//! ## Architecture
//! ```text
//! start(command)
//!   ├─► spawn `sh -c <command>` (stdin/stdout/stderr piped)
//!   ├─► stdout pump ──┐
//!   ├─► stderr pump ──┼──► line channel ──► reader loop
//!   └─► stats ticker  │                       ├─► Bus: ConsoleLine (verbatim)
//!                     │                       ├─► parser::classify
//!                     │                       │     ├─► StatsTracker updates
//!                     │                       │     └─► Bus: Ready/Join/Leave
//!                     │                       └─ on channel end (both EOF):
//!                     │                            reap child → on_exit()
//!                     ▼
//! stop()                                      on_exit():
//!   ├─► operator flag, "stop" line to stdin     ├─► state → Stopped, teardown
//!   ├─► forced-kill deadline (60s)              ├─► resolve exit signal (once)
//!   └─► StopFuture(exit signal)                 └─► crash? → schedule relaunch
//! ```
//!
//! ## Rules
//! - All session mutation (`start`, `stop`, `send_command`, exit handling)
//!   serializes behind one async mutex; a start can never race a stop.
//! - The reader's end-of-stream is the authoritative liveness signal — the
//!   supervisor never polls the child.
//! - The exit signal resolves exactly once per session, on the first terminal
//!   event; the forced-kill timer stands down if natural exit wins.
//! - A crash (EOF with no prior stop request) relaunches the same command
//!   after the crash-backoff delay; the crash counter resets once the server
//!   reports ready or an operator stop intervenes.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::ProcessConfig;
use crate::console::{parser, ConsoleEvent, StatsSnapshot, StatsTracker};
use crate::error::ProcessError;
use crate::events::{Bus, Event, EventKind};

use super::state::{ProcessState, StopFuture};

/// The two console commands whose responses feed the stats poll.
const POLL_COMMANDS: [&str; 2] = ["list", "tps"];

/// One supervised process session. Exclusively owned by the supervisor.
struct ProcessSession {
    state: ProcessState,
    /// Last-known launch command; survives stop so backups can relaunch.
    command: Option<String>,
    stdin: Option<ChildStdin>,
    child: Option<Arc<Mutex<Child>>>,
    /// Resolved (cancelled) exactly once, when exit is observed.
    exited: CancellationToken,
    /// Set by `stop()`; distinguishes operator stop from crash.
    operator_stop: bool,
    /// Consecutive crashes without a ready signal in between.
    crash_count: u32,
    poll_cancel: Option<CancellationToken>,
}

impl ProcessSession {
    fn idle() -> Self {
        Self {
            state: ProcessState::Stopped,
            command: None,
            stdin: None,
            child: None,
            exited: CancellationToken::new(),
            operator_stop: false,
            crash_count: 0,
            poll_cancel: None,
        }
    }
}

/// Supervises the external server process: start/stop/command relay, console
/// streaming, stats polling, crash recovery.
pub struct ProcessSupervisor {
    cfg: ProcessConfig,
    bus: Bus,
    stats: StatsTracker,
    poll_interval: StdRwLock<Duration>,
    session: Mutex<ProcessSession>,
}

impl ProcessSupervisor {
    /// Creates a supervisor with no active session.
    pub fn new(cfg: ProcessConfig, bus: Bus) -> Arc<Self> {
        let poll_interval = StdRwLock::new(cfg.poll_interval);
        Arc::new(Self {
            cfg,
            bus,
            stats: StatsTracker::new(),
            poll_interval,
            session: Mutex::new(ProcessSession::idle()),
        })
    }

    /// Spawns the server with the given shell command.
    ///
    /// Fails fast with [`ProcessError::AlreadyRunning`] unless the state is
    /// `Stopped`. On success the session is `Running`, the reader task is
    /// draining the combined output, and the stats ticker is armed.
    pub async fn start(self: &Arc<Self>, command: impl Into<String>) -> Result<(), ProcessError> {
        let command = command.into();
        let mut session = self.session.lock().await;
        if session.state != ProcessState::Stopped {
            return Err(ProcessError::AlreadyRunning);
        }
        session.state = ProcessState::Starting;
        self.bus
            .publish(Event::new(EventKind::ServerStarting).with_line(command.clone()));

        let mut child = match shell_command(&command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                session.state = ProcessState::Stopped;
                self.bus
                    .publish(Event::console(format!("Failed to start server: {err}")));
                return Err(ProcessError::Spawn(err));
            }
        };

        self.stats.reset();
        self.stats.mark_started(Instant::now());

        // Both stream pumps feed one line channel; the channel closing means
        // both streams hit EOF, which is the session's liveness signal.
        let (line_tx, line_rx) = mpsc::channel::<String>(256);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump_lines(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_lines(stderr, line_tx.clone()));
        }
        drop(line_tx);

        let exited = CancellationToken::new();
        let child = Arc::new(Mutex::new(child));

        session.stdin = child.lock().await.stdin.take();
        session.child = Some(Arc::clone(&child));
        session.exited = exited.clone();
        session.operator_stop = false;
        session.command = Some(command.clone());
        session.state = ProcessState::Running;
        if let Some(cancel) = session.poll_cancel.take() {
            cancel.cancel();
        }
        session.poll_cancel = Some(self.spawn_poll_ticker(exited));
        drop(session);

        tokio::spawn(Arc::clone(self).read_loop(line_rx, child));

        self.bus.publish(Event::new(EventKind::ServerStarted));
        self.bus
            .publish(Event::console(format!("Server started with command: {command}")));
        Ok(())
    }

    /// Requests a graceful stop and returns a future resolving when exit is
    /// observed.
    ///
    /// No-op (already-resolved future) when no session is active; a repeated
    /// call while stopping reuses the same exit signal. Sends the configured
    /// graceful-shutdown line and arms the forced-kill deadline.
    pub async fn stop(self: &Arc<Self>) -> StopFuture {
        let mut session = self.session.lock().await;
        match session.state {
            ProcessState::Stopped => return StopFuture::ready(),
            ProcessState::Stopping => return StopFuture::pending(session.exited.clone()),
            ProcessState::Starting | ProcessState::Running => {}
        }

        session.operator_stop = true;
        session.crash_count = 0;
        session.state = ProcessState::Stopping;
        let exited = session.exited.clone();
        let child = session.child.clone();

        let written = match session.stdin.as_mut() {
            Some(stdin) => write_line(stdin, &self.cfg.stop_command).await,
            None => Err(std::io::Error::other("stdin already released")),
        };
        drop(session);

        self.bus.publish(Event::new(EventKind::ServerStopping));
        match written {
            Ok(()) => {
                self.bus.publish(Event::console("Server stop command sent"));
                if let Some(child) = child {
                    self.arm_kill_deadline(child, exited.clone());
                }
            }
            Err(err) => {
                // The graceful line cannot reach the server; fall back to a
                // forced kill right away.
                self.bus
                    .publish(Event::console(format!("Error sending stop command: {err}")));
                if let Some(child) = child {
                    let _ = child.lock().await.start_kill();
                }
            }
        }
        StopFuture::pending(exited)
    }

    /// Writes one line to the server's stdin.
    ///
    /// Valid only in `Running`; the echoed `> command` line is published to
    /// the console sink.
    pub async fn send_command(&self, command: &str) -> Result<(), ProcessError> {
        let mut session = self.session.lock().await;
        if session.state != ProcessState::Running {
            return Err(ProcessError::NotRunning);
        }
        let stdin = session.stdin.as_mut().ok_or(ProcessError::NotRunning)?;
        write_line(stdin, command)
            .await
            .map_err(ProcessError::Stdin)?;
        drop(session);
        self.bus.publish(Event::console(format!("> {command}")));
        Ok(())
    }

    /// Point-in-time stats snapshot; does not block or trigger polling.
    pub async fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.is_running().await)
    }

    /// True while the session state is `Running`.
    pub async fn is_running(&self) -> bool {
        self.session.lock().await.state == ProcessState::Running
    }

    /// Current session state.
    pub async fn state(&self) -> ProcessState {
        self.session.lock().await.state
    }

    /// The command of the current or most recent session, if any.
    pub async fn last_command(&self) -> Option<String> {
        self.session.lock().await.command.clone()
    }

    /// Changes the stats-poll period, atomically cancelling and rearming the
    /// ticker. An in-flight settle wait is not affected.
    pub async fn set_poll_interval(self: &Arc<Self>, interval: Duration) {
        *self.poll_interval.write().expect("poll interval lock poisoned") = interval;
        let mut session = self.session.lock().await;
        if let Some(cancel) = session.poll_cancel.take() {
            cancel.cancel();
        }
        if session.state.is_active() {
            session.poll_cancel = Some(self.spawn_poll_ticker(session.exited.clone()));
        }
    }

    /// Reader loop: drains the line channel, then treats its closure (both
    /// streams at EOF) as the exit signal.
    fn read_loop(
        self: Arc<Self>,
        mut lines: mpsc::Receiver<String>,
        child: Arc<Mutex<Child>>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            while let Some(line) = lines.recv().await {
                self.handle_line(&line).await;
            }
            let status = child.lock().await.wait().await.ok();
            self.on_exit(status.map(|s| s.to_string())).await;
        })
    }

    /// Forwards one console line verbatim, classifies it, and updates derived
    /// state.
    async fn handle_line(self: &Arc<Self>, line: &str) {
        self.bus.publish(Event::console(line));
        match parser::classify(line) {
            Some(ConsoleEvent::OnlinePlayers(count)) => self.stats.set_online_players(count),
            Some(ConsoleEvent::Memory(value)) => self.stats.set_memory(value),
            Some(ConsoleEvent::Tps(value)) => self.stats.set_tps(value),
            Some(ConsoleEvent::Ready) => {
                self.session.lock().await.crash_count = 0;
                self.bus.publish(Event::new(EventKind::ServerReady));
            }
            Some(ConsoleEvent::PlayerJoined(name)) => {
                self.bus
                    .publish(Event::new(EventKind::PlayerJoined).with_player(name));
            }
            Some(ConsoleEvent::PlayerLeft(name)) => {
                self.bus
                    .publish(Event::new(EventKind::PlayerLeft).with_player(name));
            }
            None => {}
        }
    }

    /// Tears the session down after exit was observed, resolves the exit
    /// signal exactly once, and schedules crash recovery when applicable.
    async fn on_exit(self: &Arc<Self>, status: Option<String>) {
        let (crashed, exited, command, crash_count) = {
            let mut session = self.session.lock().await;
            if session.state == ProcessState::Stopped {
                return;
            }
            let crashed = !session.operator_stop;
            session.state = ProcessState::Stopped;
            session.stdin = None;
            session.child = None;
            session.operator_stop = false;
            if let Some(cancel) = session.poll_cancel.take() {
                cancel.cancel();
            }
            if crashed {
                session.crash_count += 1;
            }
            (
                crashed,
                session.exited.clone(),
                session.command.clone(),
                session.crash_count,
            )
        };

        self.stats.mark_stopped();
        self.bus.publish(Event::console("Server stopped completely"));
        self.bus.publish(Event::new(EventKind::ServerStopped));
        exited.cancel();

        if !crashed {
            return;
        }
        self.bus.publish(
            Event::new(EventKind::ServerCrashed)
                .with_reason(status.unwrap_or_else(|| "unknown exit status".to_string())),
        );
        if !self.cfg.restart.restarts_on_crash() {
            return;
        }
        let Some(command) = command else { return };

        let delay = self.cfg.crash_backoff.next(crash_count.saturating_sub(1));
        self.bus.publish(
            Event::new(EventKind::RestartScheduled)
                .with_delay(delay)
                .with_attempt(crash_count),
        );
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            time::sleep(delay).await;
            match supervisor.start(command).await {
                // An operator beat the relaunch to it; nothing to recover.
                Ok(()) | Err(ProcessError::AlreadyRunning) => {}
                Err(err) => {
                    supervisor
                        .bus
                        .publish(Event::console(format!("Failed to restart server: {err}")));
                }
            }
        });
    }

    /// Arms the forced-kill deadline; stands down if exit is observed first.
    fn arm_kill_deadline(&self, child: Arc<Mutex<Child>>, exited: CancellationToken) {
        let deadline = self.cfg.kill_deadline;
        tokio::spawn(async move {
            tokio::select! {
                _ = exited.cancelled() => {}
                _ = time::sleep(deadline) => {
                    let _ = child.lock().await.start_kill();
                }
            }
        });
    }

    /// Spawns the periodic stats poll for the current session.
    ///
    /// Each tick sends the info commands, waits the settle delay for their
    /// responses to arrive through the reader, then publishes the snapshot.
    fn spawn_poll_ticker(self: &Arc<Self>, exited: CancellationToken) -> CancellationToken {
        let cancel = CancellationToken::new();
        let guard = cancel.clone();
        let supervisor = Arc::clone(self);
        let interval = *self
            .poll_interval
            .read()
            .expect("poll interval lock poisoned");
        let settle = self.cfg.settle_delay;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = guard.cancelled() => break,
                    _ = exited.cancelled() => break,
                    _ = time::sleep(interval) => {}
                }
                if !supervisor.is_running().await {
                    continue;
                }
                let mut sent = true;
                for command in POLL_COMMANDS {
                    if supervisor.send_command(command).await.is_err() {
                        sent = false;
                        break;
                    }
                }
                if !sent {
                    continue;
                }
                time::sleep(settle).await;
                let snapshot = supervisor.stats.snapshot(supervisor.is_running().await);
                supervisor
                    .bus
                    .publish(Event::console(snapshot.to_console_block()));
                supervisor
                    .bus
                    .publish(Event::new(EventKind::StatsSampled).with_stats(snapshot));
            }
        });
        cancel
    }
}

/// Builds the platform shell invocation for a launch command.
fn shell_command(command: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// Writes one newline-terminated line and flushes.
async fn write_line(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

/// Reads lines from one stream half into the shared line channel.
async fn pump_lines<R: AsyncRead + Unpin>(reader: R, tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::{BackoffPolicy, JitterPolicy, RestartPolicy};
    use tokio::sync::broadcast;

    /// Shell loop that exits cleanly when it reads the graceful stop line.
    const OBEDIENT_SERVER: &str = r#"while read line; do if [ "$line" = "stop" ]; then exit 0; fi; done"#;

    fn test_config(restart: RestartPolicy) -> ProcessConfig {
        ProcessConfig {
            stop_command: "stop".to_string(),
            kill_deadline: Duration::from_millis(400),
            settle_delay: Duration::from_millis(10),
            poll_interval: Duration::from_secs(3600),
            restart,
            crash_backoff: BackoffPolicy {
                first: Duration::from_millis(50),
                max: Duration::from_millis(50),
                factor: 1.0,
                jitter: JitterPolicy::None,
            },
        }
    }

    fn supervisor(restart: RestartPolicy) -> (Arc<ProcessSupervisor>, broadcast::Receiver<Event>) {
        let bus = Bus::new(256);
        let rx = bus.subscribe();
        (ProcessSupervisor::new(test_config(restart), bus), rx)
    }

    async fn wait_for_kind(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
        time::timeout(Duration::from_secs(5), async {
            loop {
                let ev = rx.recv().await.expect("bus closed");
                if ev.kind == kind {
                    return ev;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {kind:?}"))
    }

    #[tokio::test]
    async fn send_command_outside_running_is_not_running() {
        let (sup, _rx) = supervisor(RestartPolicy::Never);
        let err = sup.send_command("list").await.unwrap_err();
        assert!(matches!(err, ProcessError::NotRunning));
    }

    #[tokio::test]
    async fn start_while_running_is_already_running() {
        let (sup, _rx) = supervisor(RestartPolicy::Never);
        sup.start(format!("sh -c '{OBEDIENT_SERVER}'")).await.unwrap();
        let err = sup.start("echo second").await.unwrap_err();
        assert!(matches!(err, ProcessError::AlreadyRunning));

        sup.stop().await.wait().await;
        assert_eq!(sup.state().await, ProcessState::Stopped);
    }

    #[tokio::test]
    async fn console_lines_are_forwarded_verbatim() {
        let (sup, mut rx) = supervisor(RestartPolicy::Never);
        sup.start("echo hello-world").await.unwrap();
        time::timeout(Duration::from_secs(5), async {
            loop {
                let ev = rx.recv().await.expect("bus closed");
                if ev.kind == EventKind::ConsoleLine
                    && ev.line.as_deref() == Some("hello-world")
                {
                    return;
                }
            }
        })
        .await
        .expect("console line never arrived");
    }

    #[tokio::test]
    async fn stop_twice_observes_one_exit() {
        let (sup, mut rx) = supervisor(RestartPolicy::Never);
        sup.start(format!("sh -c '{OBEDIENT_SERVER}'")).await.unwrap();

        let first = sup.stop().await;
        let second = sup.stop().await;
        time::timeout(Duration::from_secs(5), first.wait())
            .await
            .expect("first stop future never resolved");
        time::timeout(Duration::from_secs(5), second.wait())
            .await
            .expect("second stop future never resolved");

        // Exactly one ServerStopped for the whole shutdown.
        wait_for_kind(&mut rx, EventKind::ServerStopped).await;
        assert_eq!(sup.state().await, ProcessState::Stopped);
        assert!(!sup.is_running().await);
    }

    #[tokio::test]
    async fn stop_with_no_session_resolves_immediately() {
        let (sup, _rx) = supervisor(RestartPolicy::Never);
        let fut = sup.stop().await;
        assert!(fut.is_complete());
        fut.wait().await;
    }

    #[tokio::test]
    async fn unresponsive_server_is_killed_after_deadline() {
        let (sup, _rx) = supervisor(RestartPolicy::Never);
        // Ignores the stop line entirely; only the forced kill can end it.
        sup.start("sleep 30").await.unwrap();
        let stop = sup.stop().await;
        time::timeout(Duration::from_secs(5), stop.wait())
            .await
            .expect("forced kill never resolved the stop future");
        assert_eq!(sup.state().await, ProcessState::Stopped);
    }

    #[tokio::test]
    async fn crash_schedules_exactly_one_restart_with_original_command() {
        let (sup, mut rx) = supervisor(RestartPolicy::OnCrash);
        sup.start("echo one-shot").await.unwrap();

        wait_for_kind(&mut rx, EventKind::ServerCrashed).await;
        let scheduled = wait_for_kind(&mut rx, EventKind::RestartScheduled).await;
        assert_eq!(scheduled.attempt, Some(1));

        // The relaunch uses the original command.
        let restarted = wait_for_kind(&mut rx, EventKind::ServerStarting).await;
        assert_eq!(restarted.line.as_deref(), Some("echo one-shot"));
    }

    #[tokio::test]
    async fn operator_stop_does_not_schedule_restart() {
        let (sup, mut rx) = supervisor(RestartPolicy::OnCrash);
        sup.start(format!("sh -c '{OBEDIENT_SERVER}'")).await.unwrap();
        sup.stop().await.wait().await;

        wait_for_kind(&mut rx, EventKind::ServerStopped).await;
        // Give any (erroneous) restart a chance to fire.
        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(sup.state().await, ProcessState::Stopped);
    }

    #[tokio::test]
    async fn stats_reflect_parsed_console_output() {
        let (sup, mut rx) = supervisor(RestartPolicy::Never);
        sup.start("echo '[Server thread/INFO]: There are 3 of a max of 20 players online'")
            .await
            .unwrap();
        wait_for_kind(&mut rx, EventKind::ServerStopped).await;
        assert_eq!(sup.stats().await.online_players, "3");
    }
}
