// src/engine/controller.rs

use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::build::{BuildBackend, BuildResult};
use crate::errors::Result;
use crate::exec::ProcessSupervisor;
use crate::watch::ChangeDetector;

use super::core::decide;
use super::{CoreCommand, CycleReason, RunSummary};

/// Top-level reload loop: rebuild on change, restart on success, stop
/// everything on shutdown.
pub struct ReloadController<B: BuildBackend> {
    builder: B,
    supervisor: ProcessSupervisor,
    detector: ChangeDetector,
    shutdown: CancellationToken,
    summary: RunSummary,
}

impl<B: BuildBackend> fmt::Debug for ReloadController<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadController")
            .field("supervisor", &self.supervisor)
            .field("detector", &self.detector)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl<B: BuildBackend> ReloadController<B> {
    pub fn new(
        builder: B,
        supervisor: ProcessSupervisor,
        detector: ChangeDetector,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            builder,
            supervisor,
            detector,
            shutdown,
            summary: RunSummary::default(),
        }
    }

    /// Run until the shutdown token fires or the change stream ends.
    ///
    /// The supervised process and the detector are always stopped before
    /// this returns.
    pub async fn run(mut self) -> Result<RunSummary> {
        info!(root = ?self.detector.root(), "hotloop started");

        if self.cycle(CycleReason::Initial).await {
            loop {
                let reason = tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => {
                        info!("shutdown requested");
                        break;
                    }
                    signal = self.detector.next_rebuild() => match signal {
                        Some(signal) => CycleReason::FileChange {
                            events: signal.events,
                            burst: signal.burst,
                        },
                        None => {
                            info!("change notifications ended");
                            break;
                        }
                    },
                };

                if !self.cycle(reason).await {
                    break;
                }
            }
        }

        self.stop_all().await;
        Ok(self.summary)
    }

    /// One build (and restart, on success). Returns `false` if shutdown was
    /// requested while building.
    async fn cycle(&mut self, reason: CycleReason) -> bool {
        match reason {
            CycleReason::Initial => info!("initial build"),
            CycleReason::FileChange { events, burst } => {
                info!(events, ?burst, "changes detected; rebuilding")
            }
        }

        let result = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                info!("shutdown requested during build; abandoning it");
                return false;
            }
            result = self.builder.build() => result,
        };
        self.summary.builds += 1;

        match decide(&result) {
            CoreCommand::Restart => {
                if !result.output.trim().is_empty() {
                    debug!(output = %result.output.trim_end(), "build output");
                }
                match self.supervisor.start().await {
                    Ok(pid) => self.summary.started_pids.push(pid),
                    Err(err) => {
                        self.summary.failed_starts += 1;
                        error!(error = %err, "failed to start process");
                    }
                }
            }
            CoreCommand::KeepCurrent => {
                self.summary.failed_builds += 1;
                report_failure(&result, self.supervisor.pid());
            }
        }
        true
    }

    async fn stop_all(&mut self) {
        let outcome = self.supervisor.stop().await;
        debug!(?outcome, "supervisor stopped");
        self.detector.stop().await;
        self.shutdown.cancel();
        info!(
            builds = self.summary.builds,
            failed = self.summary.failed_builds,
            "hotloop stopped"
        );
    }
}

fn report_failure(result: &BuildResult, running: Option<u32>) {
    let reason = result
        .failure
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown error".to_string());
    match running {
        Some(pid) => warn!(pid, duration = ?result.duration, "build failed: {reason}; keeping current process"),
        None => warn!(duration = ?result.duration, "build failed: {reason}"),
    }
    let output = result.output.trim_end();
    if !output.is_empty() {
        error!("build output:\n{output}");
    }
}
