// src/config/mod.rs

//! Configuration loading and validation for hotloop.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk, falling back to defaults (`loader.rs`).
//! - Validate values and resolve build/run commands (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    DEFAULT_CONFIG_FILE, default_config_path, load_and_validate, load_from_path, load_or_default,
    warn_if_server_without_port,
};
pub use model::{BuildSection, ConfigFile, RawConfigFile, RunSection, WatchSection};
pub use validate::{derived_commands, from_raw};
