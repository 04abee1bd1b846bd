#![allow(dead_code)]

use std::path::PathBuf;

use hotloop::config::{ConfigFile, RawConfigFile};
use hotloop::types::{Platform, PortReclaim};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the built-in defaults with no commands set.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_watch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.watch.dir = dir.into();
        self
    }

    pub fn with_ignore(mut self, patterns: &[&str]) -> Self {
        self.config.watch.ignore = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.config.watch.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn with_timing(mut self, quiet_ms: u64, max_wait_ms: u64) -> Self {
        self.config.watch.quiet_ms = quiet_ms;
        self.config.watch.max_wait_ms = max_wait_ms;
        self
    }

    pub fn with_main(mut self, main: impl Into<PathBuf>) -> Self {
        self.config.build.main = Some(main.into());
        self
    }

    pub fn with_build(mut self, cmd: &str) -> Self {
        self.config.build.cmd = Some(cmd.to_string());
        self
    }

    pub fn with_run(mut self, cmd: &str) -> Self {
        self.config.run.cmd = Some(cmd.to_string());
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.config.run.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_port(mut self, port: u16, reclaim: PortReclaim) -> Self {
        self.config.run.port = Some(port);
        self.config.run.port_reclaim = reclaim;
        self
    }

    pub fn with_grace_ms(mut self, grace_ms: u64) -> Self {
        self.config.run.grace_ms = grace_ms;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    /// Validate for a POSIX host, so command derivation is predictable.
    pub fn build(self) -> ConfigFile {
        hotloop::config::from_raw(self.config, Platform::Posix)
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
