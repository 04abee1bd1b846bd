use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Operating system family, used to pick termination primitives and the
/// default build/run command layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Posix,
    Windows,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }

    pub fn is_windows(self) -> bool {
        matches!(self, Platform::Windows)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Posix => f.write_str("posix"),
            Platform::Windows => f.write_str("windows"),
        }
    }
}

/// Whether to kill whatever listens on the configured port after stopping
/// the supervised process.
///
/// - `Auto`: follow the termination provider's default (on for Windows,
///   where killing the tracked pid often leaves the socket bound).
/// - `Always` / `Never`: explicit override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortReclaim {
    Auto,
    Always,
    Never,
}

impl Default for PortReclaim {
    fn default() -> Self {
        PortReclaim::Auto
    }
}

impl PortReclaim {
    /// Resolve the policy against the provider default.
    pub fn enabled(self, provider_default: bool) -> bool {
        match self {
            PortReclaim::Auto => provider_default,
            PortReclaim::Always => true,
            PortReclaim::Never => false,
        }
    }
}

impl FromStr for PortReclaim {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(PortReclaim::Auto),
            "always" => Ok(PortReclaim::Always),
            "never" => Ok(PortReclaim::Never),
            other => Err(format!(
                "invalid port_reclaim: {other} (expected \"auto\", \"always\" or \"never\")"
            )),
        }
    }
}
