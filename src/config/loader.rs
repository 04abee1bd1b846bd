// src/config/loader.rs

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{HotloopError, Result};
use crate::fs::{FileSystem, RealFileSystem};

/// Default config file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "Hotloop.toml";

/// Substrings (lowercase) that mark a Go entry point as an HTTP server.
const SERVER_SIGNATURES: &[&str] = &[
    "net/http",
    "http.listenandserve",
    "router",
    "handlefunc",
    "gin.default",
    "echo.new",
    "fiber.new",
    "mux.newrouter",
];

/// Read and deserialize a config file without validating it.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    load_with(&RealFileSystem, path.as_ref())
}

fn load_with(fs: &dyn FileSystem, path: &Path) -> Result<RawConfigFile> {
    let contents = fs.read_to_string(path)?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load `path`, or fall back to built-in defaults when it does not exist.
///
/// A missing file is only tolerated when `explicit` is false, i.e. when the
/// path is the default location rather than something the user passed.
pub fn load_or_default(fs: &dyn FileSystem, path: &Path, explicit: bool) -> Result<RawConfigFile> {
    if fs.exists(path) {
        debug!(path = ?path, "loading config file");
        return load_with(fs, path);
    }
    if explicit {
        return Err(HotloopError::ConfigError(format!(
            "config file {} does not exist",
            path.display()
        )));
    }
    debug!(path = ?path, "no config file; using defaults");
    Ok(RawConfigFile::default())
}

/// Load a config file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Whether the Go source looks like it starts an HTTP server.
pub fn looks_like_web_server(source: &str) -> bool {
    let text = source.to_lowercase();
    SERVER_SIGNATURES.iter().any(|sig| text.contains(sig))
}

/// Warn when `cfg.main` looks like a web server but no port is configured,
/// since port reclamation then has nothing to work with.
///
/// Returns whether the warning was emitted.
pub fn warn_if_server_without_port(fs: &dyn FileSystem, cfg: &ConfigFile) -> bool {
    let Some(main) = cfg.main.as_deref() else {
        return false;
    };
    if cfg.run.port.is_some() {
        return false;
    }
    match fs.read_to_string(main) {
        Ok(source) if looks_like_web_server(&source) => {
            warn!(
                main = ?main,
                "application looks like a web server but no port is set; use --port or [run].port"
            );
            true
        }
        Ok(_) => false,
        Err(err) => {
            warn!(main = ?main, error = %err, "could not read main file");
            false
        }
    }
}
