// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::loader::default_config_path;
use crate::config::model::RawConfigFile;
use crate::types::PortReclaim;

/// Command-line arguments for `hotloop`.
///
/// Every flag overrides the matching value from the config file.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "hotloop",
    version,
    about = "Rebuild and restart a program whenever its sources change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Hotloop.toml` in the current directory, if it exists.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory to watch for changes.
    #[arg(long, value_name = "DIR")]
    pub watch: Option<PathBuf>,

    /// Build command, e.g. "go build -o ./temp/app ./cmd/app".
    #[arg(long, value_name = "CMD")]
    pub build: Option<String>,

    /// Command that runs the built program.
    #[arg(long, value_name = "CMD")]
    pub run: Option<String>,

    /// Go entry point; derives the build and run commands when they are not set.
    #[arg(long, value_name = "FILE")]
    pub main: Option<PathBuf>,

    /// Port the program listens on (enables port reclamation).
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Extra ignore glob, relative to the watched directory. Repeatable.
    #[arg(long = "ignore", value_name = "GLOB")]
    pub ignore: Vec<String>,

    /// Kill leftover listeners on the port after stopping: auto, always, never.
    #[arg(long, value_name = "POLICY")]
    pub port_reclaim: Option<PortReclaim>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HOTLOOP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and validate the configuration, print it, and exit.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// Config path to load, and whether the user asked for it explicitly.
    pub fn config_path(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (default_config_path(), false),
        }
    }

    /// Overlay the flags that were given onto `raw`.
    ///
    /// `--ignore` patterns are appended to the configured list.
    pub fn apply_to(&self, raw: &mut RawConfigFile) {
        if let Some(dir) = &self.watch {
            raw.watch.dir = dir.clone();
        }
        if let Some(cmd) = &self.build {
            raw.build.cmd = Some(cmd.clone());
        }
        if let Some(cmd) = &self.run {
            raw.run.cmd = Some(cmd.clone());
        }
        if let Some(main) = &self.main {
            raw.build.main = Some(main.clone());
        }
        if let Some(port) = self.port {
            raw.run.port = Some(port);
        }
        if let Some(policy) = self.port_reclaim {
            raw.run.port_reclaim = policy;
        }
        raw.watch.ignore.extend(self.ignore.iter().cloned());
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
