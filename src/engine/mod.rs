// src/engine/mod.rs

//! Orchestration engine for hotloop.
//!
//! The decision about what a finished build means for the running process
//! lives in [`core`] as a pure function; [`controller`] is the async shell
//! that waits for rebuild signals and shutdown, and drives the build backend
//! and the process supervisor.

use std::time::Duration;

pub mod controller;
pub mod core;

pub use controller::ReloadController;
pub use core::decide;

/// Why a build/restart cycle ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleReason {
    /// The build-and-start cycle at startup.
    Initial,
    /// A debounced burst of file changes.
    FileChange { events: usize, burst: Duration },
}

/// What the controller should do after a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreCommand {
    /// Stop the current process (if any) and start the fresh artifact.
    Restart,
    /// Report the failure and leave the current process untouched.
    KeepCurrent,
}

/// Counters returned by [`ReloadController::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub builds: usize,
    pub failed_builds: usize,
    pub failed_starts: usize,
    /// Pids of every process started, in order.
    pub started_pids: Vec<u32>,
}
