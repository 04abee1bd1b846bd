// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`] splits configured command strings into program + arguments.
//! - [`supervisor`] owns the single long-running child process: start, exit
//!   monitoring, graceful-then-forced stop, port reclamation.
//! - [`termination`] provides the `TerminationProvider` trait and the
//!   POSIX/Windows implementations the supervisor delegates to.

pub mod command;
pub mod supervisor;
pub mod termination;

pub use command::CommandLine;
pub use supervisor::{
    ExitOutcome, ProcessSupervisor, StopOutcome, SupervisorOptions, SupervisorState,
    DEFAULT_GRACE_PERIOD, DEFAULT_SETTLE_DELAY,
};
pub use termination::{
    PosixTermination, ProviderFuture, TerminationProvider, WindowsTermination, for_platform,
};
