// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::Result;
use crate::exec::supervisor::{DEFAULT_SETTLE_DELAY, SupervisorOptions};
use crate::types::PortReclaim;
use crate::watch::{
    DEFAULT_EXTENSIONS, DEFAULT_IGNORE, DebounceConfig, ExtensionFilter, IgnoreSet, WatchSpec,
};

/// Configuration as read from `Hotloop.toml`, before validation.
///
/// ```toml
/// [watch]
/// dir = "."
/// ignore = ["vendor", "vendor/*"]
/// quiet_ms = 300
///
/// [build]
/// main = "./cmd/server/main.go"
///
/// [run]
/// port = 8080
/// env = { APP_ENV = "dev" }
/// ```
///
/// Every section and field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub run: RunSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Root of the watched tree.
    #[serde(default = "default_watch_dir")]
    pub dir: PathBuf,

    /// Globs relative to `dir`. Replaces the default list when present.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    /// Tracked file extensions, without the dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Quiet window after the last change before rebuilding.
    #[serde(default = "default_quiet_ms")]
    pub quiet_ms: u64,

    /// Hard cap on how long a burst may postpone a rebuild.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

fn default_watch_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_ignore() -> Vec<String> {
    DEFAULT_IGNORE.iter().map(|s| s.to_string()).collect()
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

fn default_quiet_ms() -> u64 {
    300
}

fn default_max_wait_ms() -> u64 {
    2000
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            dir: default_watch_dir(),
            ignore: default_ignore(),
            extensions: default_extensions(),
            quiet_ms: default_quiet_ms(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

/// `[build]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildSection {
    #[serde(default)]
    pub cmd: Option<String>,

    /// Go entry point. Build and run commands are derived from it when not
    /// given explicitly.
    #[serde(default)]
    pub main: Option<PathBuf>,
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    #[serde(default)]
    pub cmd: Option<String>,

    /// Extra environment variables for the child, on top of ours.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Time allowed for a graceful exit before the process is killed.
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,

    #[serde(default)]
    pub port_reclaim: PortReclaim,
}

fn default_grace_ms() -> u64 {
    500
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            cmd: None,
            env: BTreeMap::new(),
            port: None,
            grace_ms: default_grace_ms(),
            port_reclaim: PortReclaim::default(),
        }
    }
}

/// Validated configuration with build and run commands resolved.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (or
/// [`crate::config::validate::from_raw`]), so its invariants always hold.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub watch: WatchSection,
    pub build_cmd: String,
    pub run_cmd: String,
    pub main: Option<PathBuf>,
    pub run: RunSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        watch: WatchSection,
        build_cmd: String,
        run_cmd: String,
        main: Option<PathBuf>,
        run: RunSection,
    ) -> Self {
        Self {
            watch,
            build_cmd,
            run_cmd,
            main,
            run,
        }
    }

    pub fn debounce(&self) -> DebounceConfig {
        DebounceConfig {
            quiet: Duration::from_millis(self.watch.quiet_ms),
            max_wait: Duration::from_millis(self.watch.max_wait_ms),
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.run.grace_ms)
    }

    pub fn watch_spec(&self) -> Result<WatchSpec> {
        let ignore = IgnoreSet::new(&self.watch.ignore)?;
        let extensions = ExtensionFilter::new(&self.watch.extensions);
        Ok(WatchSpec::new(&self.watch.dir, ignore, extensions).with_debounce(self.debounce()))
    }

    pub fn supervisor_options(&self) -> SupervisorOptions {
        SupervisorOptions {
            run_command: self.run_cmd.clone(),
            env: self.run.env.clone(),
            port: self.run.port,
            grace_period: self.grace_period(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            port_reclaim: self.run.port_reclaim,
        }
    }
}
