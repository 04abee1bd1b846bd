// src/config/validate.rs

use std::path::Path;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{HotloopError, Result};
use crate::types::Platform;
use crate::watch::IgnoreSet;

/// Name of the binary produced by commands derived from `[build].main`.
pub const DERIVED_BINARY: &str = "hotloop-app";

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = HotloopError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        from_raw(raw, Platform::current())
    }
}

/// Validate `raw` and resolve its commands for `platform`.
pub fn from_raw(raw: RawConfigFile, platform: Platform) -> Result<ConfigFile> {
    validate_watch(&raw)?;
    validate_run(&raw)?;

    let (build_cmd, run_cmd) = resolve_commands(&raw, platform)?;
    let RawConfigFile { watch, build, run } = raw;
    Ok(ConfigFile::new_unchecked(watch, build_cmd, run_cmd, build.main, run))
}

/// Build and run commands for a Go entry point.
pub fn derived_commands(main: &Path, platform: Platform) -> (String, String) {
    let main = main.display();
    if platform.is_windows() {
        (
            format!("go build -mod=mod -o .\\temp\\{DERIVED_BINARY}.exe {main}"),
            format!(".\\temp\\{DERIVED_BINARY}.exe"),
        )
    } else {
        (
            format!("go build -mod=mod -o ./temp/{DERIVED_BINARY} {main}"),
            format!("./temp/{DERIVED_BINARY}"),
        )
    }
}

fn resolve_commands(raw: &RawConfigFile, platform: Platform) -> Result<(String, String)> {
    let derived = raw
        .build
        .main
        .as_deref()
        .map(|main| derived_commands(main, platform));

    let build_cmd = explicit(&raw.build.cmd)
        .or_else(|| derived.as_ref().map(|(build, _)| build.clone()))
        .ok_or_else(|| {
            HotloopError::ConfigError(
                "no build command: set [build].cmd or [build].main (or --build/--main)".to_string(),
            )
        })?;
    let run_cmd = explicit(&raw.run.cmd)
        .or_else(|| derived.as_ref().map(|(_, run)| run.clone()))
        .ok_or_else(|| {
            HotloopError::ConfigError(
                "no run command: set [run].cmd or [build].main (or --run/--main)".to_string(),
            )
        })?;

    Ok((build_cmd, run_cmd))
}

/// A configured command, unless it is blank.
fn explicit(cmd: &Option<String>) -> Option<String> {
    cmd.as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    let watch = &cfg.watch;
    if watch.quiet_ms == 0 {
        return Err(HotloopError::ConfigError(
            "[watch].quiet_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if watch.max_wait_ms < watch.quiet_ms {
        return Err(HotloopError::ConfigError(format!(
            "[watch].max_wait_ms ({}) must be >= quiet_ms ({})",
            watch.max_wait_ms, watch.quiet_ms
        )));
    }
    if watch.extensions.iter().all(|e| e.trim_start_matches('.').is_empty()) {
        return Err(HotloopError::ConfigError(
            "[watch].extensions must name at least one extension".to_string(),
        ));
    }
    IgnoreSet::new(&watch.ignore)?;
    Ok(())
}

fn validate_run(cfg: &RawConfigFile) -> Result<()> {
    if cfg.run.grace_ms == 0 {
        return Err(HotloopError::ConfigError(
            "[run].grace_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.run.port == Some(0) {
        return Err(HotloopError::ConfigError(
            "[run].port must be between 1 and 65535".to_string(),
        ));
    }
    Ok(())
}
