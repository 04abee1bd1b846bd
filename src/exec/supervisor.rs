// src/exec/supervisor.rs

//! Lifecycle of the single supervised child process.
//!
//! `Idle -> start -> Running -> stop -> Stopping -> Idle`. Stopping sends a
//! graceful termination request first and escalates to a forced kill when the
//! grace period runs out. Exit is observed by a monitor task that owns the
//! `Child` and publishes the outcome on a `watch` channel.

use std::collections::BTreeMap;
use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::errors::{HotloopError, Result};
use crate::exec::command::CommandLine;
use crate::exec::termination::TerminationProvider;
use crate::types::PortReclaim;

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(500);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Upper bound on waiting for the monitor after a forced kill.
const REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// How the supervised process is launched and stopped.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Whitespace-split into program and arguments at each start.
    pub run_command: String,
    /// Added on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Port the process listens on, used for reclamation.
    pub port: Option<u16>,
    pub grace_period: Duration,
    /// Pause before looking for leftover listeners on `port`.
    pub settle_delay: Duration,
    pub port_reclaim: PortReclaim,
}

impl SupervisorOptions {
    pub fn new(run_command: impl Into<String>) -> Self {
        Self {
            run_command: run_command.into(),
            env: BTreeMap::new(),
            port: None,
            grace_period: DEFAULT_GRACE_PERIOD,
            settle_delay: DEFAULT_SETTLE_DELAY,
            port_reclaim: PortReclaim::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Running { pid: u32 },
    Stopping { pid: u32 },
}

/// How the child ended, as seen by the exit monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Code(i32),
    /// Terminated by a signal (Unix only).
    Signaled,
    /// `wait` itself failed; the child was dropped and killed.
    WaitFailed,
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => ExitOutcome::Code(code),
            None => ExitOutcome::Signaled,
        }
    }
}

/// Result of [`ProcessSupervisor::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning,
    /// The process had exited on its own before stop was called.
    AlreadyExited,
    /// Exited within the grace period.
    Graceful,
    /// Needed a forced kill.
    Forced,
}

struct ProcessHandle {
    pid: u32,
    command: String,
    started_at: Instant,
    exit_rx: watch::Receiver<Option<ExitOutcome>>,
    monitor: JoinHandle<()>,
}

impl ProcessHandle {
    fn exit_outcome(&self) -> Option<ExitOutcome> {
        *self.exit_rx.borrow()
    }

    fn has_exited(&self) -> bool {
        self.exit_outcome().is_some()
    }

    /// Wait up to `limit` for the monitor to observe exit.
    async fn wait_exit(&mut self, limit: Duration) -> bool {
        // A closed channel means the monitor is gone and the child was dropped.
        timeout(limit, self.exit_rx.wait_for(Option::is_some))
            .await
            .is_ok()
    }

    async fn join_monitor(&mut self) {
        if let Err(err) = (&mut self.monitor).await
            && !err.is_cancelled()
        {
            warn!(pid = self.pid, error = %err, "exit monitor ended abnormally");
        }
    }
}

enum Slot {
    Idle,
    Running(ProcessHandle),
    Stopping(ProcessHandle),
}

/// Owns at most one running child process.
pub struct ProcessSupervisor {
    options: SupervisorOptions,
    provider: Arc<dyn TerminationProvider>,
    slot: Slot,
    last_exit: Option<ExitOutcome>,
}

impl fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("command", &self.options.run_command)
            .field("state", &self.state())
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    pub fn new(options: SupervisorOptions, provider: Arc<dyn TerminationProvider>) -> Self {
        Self {
            options,
            provider,
            slot: Slot::Idle,
            last_exit: None,
        }
    }

    pub fn options(&self) -> &SupervisorOptions {
        &self.options
    }

    /// Current lifecycle state. A process that exited on its own reads as
    /// `Idle` even before `stop` cleans up after it.
    pub fn state(&self) -> SupervisorState {
        match &self.slot {
            Slot::Idle => SupervisorState::Idle,
            Slot::Running(handle) if handle.has_exited() => SupervisorState::Idle,
            Slot::Running(handle) => SupervisorState::Running { pid: handle.pid },
            Slot::Stopping(handle) => SupervisorState::Stopping { pid: handle.pid },
        }
    }

    pub fn pid(&self) -> Option<u32> {
        match self.state() {
            SupervisorState::Idle => None,
            SupervisorState::Running { pid } | SupervisorState::Stopping { pid } => Some(pid),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), SupervisorState::Running { .. })
    }

    /// Exit outcome of the most recent process, once known.
    pub fn last_exit(&self) -> Option<ExitOutcome> {
        match &self.slot {
            Slot::Running(handle) | Slot::Stopping(handle) => handle.exit_outcome(),
            Slot::Idle => self.last_exit,
        }
    }

    /// Launch the run command, stopping any previous instance first.
    ///
    /// An empty command fails with `ConfigError` before anything is stopped.
    pub async fn start(&mut self) -> Result<u32> {
        let command = CommandLine::parse(&self.options.run_command, "run")?;

        let previous = self.stop_process(true).await;
        if previous != StopOutcome::NotRunning {
            debug!(?previous, "previous process stopped before restart");
        }

        let mut cmd = command.to_command();
        cmd.envs(&self.options.env)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| HotloopError::Launch {
            command: command.to_string(),
            source,
        })?;
        let pid = child.id().ok_or_else(|| {
            HotloopError::Other(anyhow::anyhow!("process '{command}' exited before it reported a pid"))
        })?;

        let (exit_tx, exit_rx) = watch::channel(None);
        let monitor = tokio::spawn(monitor_exit(child, pid, exit_tx));

        info!(pid, command = %command, "started process");
        self.slot = Slot::Running(ProcessHandle {
            pid,
            command: command.to_string(),
            started_at: Instant::now(),
            exit_rx,
            monitor,
        });
        Ok(pid)
    }

    /// Stop the running process. No-op when idle; safe to call repeatedly.
    ///
    /// The port is reclaimed afterwards when the process needed a forced kill
    /// or had already exited on its own, since either may leave a listener
    /// behind. Failures along the way are logged and never returned.
    pub async fn stop(&mut self) -> StopOutcome {
        self.stop_process(false).await
    }

    async fn stop_process(&mut self, restarting: bool) -> StopOutcome {
        let provider = Arc::clone(&self.provider);
        let grace = self.options.grace_period;

        let Some(handle) = begin_stop(&mut self.slot) else {
            return StopOutcome::NotRunning;
        };
        let outcome = terminate(handle, provider.as_ref(), grace).await;
        info!(
            pid = handle.pid,
            command = %handle.command,
            uptime = ?handle.started_at.elapsed(),
            ?outcome,
            "process stopped"
        );
        self.last_exit = handle.exit_outcome();
        self.slot = Slot::Idle;

        // Only a clean graceful stop outside a restart skips reclamation.
        if restarting || outcome != StopOutcome::Graceful {
            self.reclaim_port().await;
        }
        outcome
    }

    /// Force-kill anything still listening on the configured port.
    async fn reclaim_port(&self) {
        let Some(port) = self.options.port else {
            return;
        };
        if !self
            .options
            .port_reclaim
            .enabled(self.provider.reclaims_ports_by_default())
        {
            return;
        }

        sleep(self.options.settle_delay).await;

        let listeners = match self.provider.find_listeners(port).await {
            Ok(pids) => pids,
            Err(err) => {
                let err = HotloopError::Cleanup(format!("listing listeners on port {port}: {err}"));
                warn!(port, error = %err, "port reclamation skipped");
                return;
            }
        };

        let own_pid = std::process::id();
        let mut killed = 0usize;
        for pid in listeners.into_iter().filter(|&pid| pid != own_pid) {
            match self.provider.force_kill(pid).await {
                Ok(()) => {
                    info!(port, pid, "killed leftover listener");
                    killed += 1;
                }
                Err(err) => {
                    let err = HotloopError::Cleanup(format!("killing PID {pid}: {err}"));
                    warn!(port, error = %err, "failed to reclaim port");
                }
            }
        }

        if killed == 0 {
            return;
        }
        match self.provider.find_listeners(port).await {
            Ok(remaining) if remaining.iter().all(|&pid| pid == own_pid) => {
                debug!(port, "port is free")
            }
            Ok(remaining) => warn!(port, ?remaining, "port still in use after cleanup"),
            Err(err) => debug!(port, error = %err, "could not verify port"),
        }
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        // Aborting the monitor drops the Child, which kills it.
        if let Slot::Running(handle) | Slot::Stopping(handle) = &self.slot {
            handle.monitor.abort();
        }
    }
}

/// Move a running handle into `Stopping` and hand it back.
fn begin_stop(slot: &mut Slot) -> Option<&mut ProcessHandle> {
    if matches!(slot, Slot::Running(_)) {
        if let Slot::Running(handle) = std::mem::replace(slot, Slot::Idle) {
            *slot = Slot::Stopping(handle);
        }
    }
    match slot {
        Slot::Stopping(handle) => Some(handle),
        _ => None,
    }
}

async fn terminate(
    handle: &mut ProcessHandle,
    provider: &dyn TerminationProvider,
    grace: Duration,
) -> StopOutcome {
    let pid = handle.pid;

    if handle.has_exited() {
        handle.join_monitor().await;
        return StopOutcome::AlreadyExited;
    }

    debug!(pid, ?grace, "requesting graceful termination");
    let exited = match provider.graceful_terminate(pid).await {
        Ok(()) => handle.wait_exit(grace).await,
        Err(err) => {
            if handle.has_exited() {
                handle.join_monitor().await;
                return StopOutcome::AlreadyExited;
            }
            warn!(pid, error = %err, "graceful termination failed");
            false
        }
    };

    let outcome = if exited {
        StopOutcome::Graceful
    } else {
        let err = HotloopError::TerminationTimeout { pid, grace };
        warn!(error = %err, "escalating to forced kill");
        if let Err(err) = provider.force_kill(pid).await {
            warn!(pid, error = %err, "forced kill failed");
        }
        if !handle.wait_exit(REAP_TIMEOUT).await {
            warn!(pid, "process not reaped after forced kill; aborting monitor");
            handle.monitor.abort();
        }
        StopOutcome::Forced
    };

    handle.join_monitor().await;
    outcome
}

async fn monitor_exit(mut child: Child, pid: u32, exit_tx: watch::Sender<Option<ExitOutcome>>) {
    let outcome = match child.wait().await {
        Ok(status) => {
            let outcome = ExitOutcome::from(status);
            match outcome {
                ExitOutcome::Code(0) => info!(pid, "process exited normally"),
                ExitOutcome::Code(code) => warn!(pid, code, "process exited with non-zero status"),
                _ => info!(pid, %status, "process terminated by signal"),
            }
            outcome
        }
        Err(err) => {
            error!(pid, error = %err, "failed to wait for process");
            ExitOutcome::WaitFailed
        }
    };
    exit_tx.send_replace(Some(outcome));
}
