// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HotloopError {
    /// Empty or invalid build/run command, bad config values.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("failed to launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("build command '{command}' exited with {status}")]
    BuildFailed { command: String, status: String },

    /// Graceful stop did not finish in time. Logged before escalating,
    /// never returned from `ProcessSupervisor::stop`.
    #[error("process {pid} did not exit within {grace:?} of graceful termination")]
    TerminationTimeout { pid: u32, grace: Duration },

    /// Port reclamation problem. Logged as a warning only.
    #[error("port cleanup failed: {0}")]
    Cleanup(String),

    #[error("failed to watch directory {path:?}: {source}")]
    WatchInit {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// A termination provider utility (kill, lsof, taskkill, netstat) failed.
    #[error("termination provider error: {0}")]
    Provider(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, HotloopError>;
