// src/exec/termination.rs

//! Platform termination primitives behind one trait.
//!
//! The supervisor never signals processes itself; it asks a
//! [`TerminationProvider`] to. [`for_platform`] picks the implementation once
//! at startup, and tests substitute their own.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::process::Output;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use crate::errors::{HotloopError, Result};
use crate::types::Platform;

/// Boxed future returned by provider methods.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// OS-level process termination and port introspection.
pub trait TerminationProvider: Send + Sync + fmt::Debug {
    /// Ask `pid` to exit (SIGTERM, or a plain `taskkill` on Windows).
    fn graceful_terminate(&self, pid: u32) -> ProviderFuture<'_, ()>;

    /// Terminate `pid` unconditionally.
    fn force_kill(&self, pid: u32) -> ProviderFuture<'_, ()>;

    /// Pids of processes listening on TCP `port`.
    fn find_listeners(&self, port: u16) -> ProviderFuture<'_, Vec<u32>>;

    /// Whether port reclamation should run when the policy is `auto`.
    fn reclaims_ports_by_default(&self) -> bool;
}

/// Provider for the given platform.
pub fn for_platform(platform: Platform) -> Arc<dyn TerminationProvider> {
    match platform {
        Platform::Posix => Arc::new(PosixTermination),
        Platform::Windows => Arc::new(WindowsTermination),
    }
}

/// Run a short-lived utility and collect its output.
async fn run_utility(program: &str, args: &[&str]) -> Result<Output> {
    debug!(program, ?args, "running termination utility");
    Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| HotloopError::Provider(format!("failed to run {program}: {e}")))
}

fn ensure_success(program: &str, pid: u32, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(HotloopError::Provider(format!(
        "{program} failed for PID {pid} ({}): {}",
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}

/// `kill` for signals and `lsof` for listening sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixTermination;

impl TerminationProvider for PosixTermination {
    fn graceful_terminate(&self, pid: u32) -> ProviderFuture<'_, ()> {
        Box::pin(async move {
            let pid_arg = pid.to_string();
            let output = run_utility("kill", &["-TERM", &pid_arg]).await?;
            ensure_success("kill -TERM", pid, &output)
        })
    }

    fn force_kill(&self, pid: u32) -> ProviderFuture<'_, ()> {
        Box::pin(async move {
            let pid_arg = pid.to_string();
            let output = run_utility("kill", &["-KILL", &pid_arg]).await?;
            ensure_success("kill -KILL", pid, &output)
        })
    }

    fn find_listeners(&self, port: u16) -> ProviderFuture<'_, Vec<u32>> {
        Box::pin(async move {
            let selector = format!("-iTCP:{port}");
            let output = run_utility("lsof", &["-nP", &selector, "-sTCP:LISTEN"]).await?;
            // lsof exits 1 when nothing matches.
            if !output.status.success() && output.stdout.is_empty() {
                return Ok(Vec::new());
            }
            Ok(parse_lsof_pids(&String::from_utf8_lossy(&output.stdout)))
        })
    }

    fn reclaims_ports_by_default(&self) -> bool {
        false
    }
}

/// `taskkill` for termination and `netstat -ano` for listening sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsTermination;

impl TerminationProvider for WindowsTermination {
    fn graceful_terminate(&self, pid: u32) -> ProviderFuture<'_, ()> {
        Box::pin(async move {
            let pid_arg = pid.to_string();
            let output = run_utility("taskkill", &["/PID", &pid_arg]).await?;
            ensure_success("taskkill", pid, &output)
        })
    }

    fn force_kill(&self, pid: u32) -> ProviderFuture<'_, ()> {
        Box::pin(async move {
            let pid_arg = pid.to_string();
            // /T also takes down children that may hold the port.
            let output = run_utility("taskkill", &["/F", "/T", "/PID", &pid_arg]).await?;
            ensure_success("taskkill /F", pid, &output)
        })
    }

    fn find_listeners(&self, port: u16) -> ProviderFuture<'_, Vec<u32>> {
        Box::pin(async move {
            let output = run_utility("netstat", &["-ano", "-p", "TCP"]).await?;
            if !output.status.success() {
                return Err(HotloopError::Provider(format!(
                    "netstat failed ({})",
                    output.status
                )));
            }
            Ok(parse_netstat_pids(&String::from_utf8_lossy(&output.stdout), port))
        })
    }

    fn reclaims_ports_by_default(&self) -> bool {
        true
    }
}

/// Extract the PID column from `lsof` output, deduplicated, header skipped.
pub fn parse_lsof_pids(output: &str) -> Vec<u32> {
    let pids: BTreeSet<u32> = output
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with("COMMAND"))
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter_map(|pid| pid.parse().ok())
        .collect();
    pids.into_iter().collect()
}

fn netstat_row() -> &'static Regex {
    static ROW: OnceLock<Regex> = OnceLock::new();
    ROW.get_or_init(|| {
        Regex::new(r"^\s*TCP\s+(\S+):(\d+)\s+\S+\s+LISTENING\s+(\d+)\s*$")
            .unwrap_or_else(|e| panic!("netstat row pattern is invalid: {e}"))
    })
}

/// Pids from `netstat -ano` rows that are LISTENING on local `port`.
pub fn parse_netstat_pids(output: &str, port: u16) -> Vec<u32> {
    let re = netstat_row();
    let pids: BTreeSet<u32> = output
        .lines()
        .filter_map(|line| re.captures(line))
        .filter(|caps| caps[2].parse::<u16>().ok() == Some(port))
        .filter_map(|caps| caps[3].parse().ok())
        .collect();
    pids.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LSOF: &str = "\
COMMAND   PID USER   FD   TYPE DEVICE SIZE/OFF NODE NAME
server  41234 dev    3u  IPv4 0x1234      0t0  TCP *:8080 (LISTEN)
server  41234 dev    4u  IPv6 0x5678      0t0  TCP *:8080 (LISTEN)
worker  41300 dev    7u  IPv4 0x9abc      0t0  TCP 127.0.0.1:8080 (LISTEN)
";

    const NETSTAT: &str = "\r
Active Connections\r
\r
  Proto  Local Address          Foreign Address        State           PID\r
  TCP    0.0.0.0:135            0.0.0.0:0              LISTENING       1060\r
  TCP    0.0.0.0:8080           0.0.0.0:0              LISTENING       5120\r
  TCP    127.0.0.1:51000        127.0.0.1:8080         ESTABLISHED     7777\r
  TCP    [::]:8080              [::]:0                 LISTENING       5120\r
  TCP    [::]:18080             [::]:0                 LISTENING       9000\r
";

    #[test]
    fn lsof_pids_are_deduplicated() {
        assert_eq!(parse_lsof_pids(LSOF), vec![41234, 41300]);
        assert!(parse_lsof_pids("").is_empty());
    }

    #[test]
    fn netstat_matches_local_listening_port_only() {
        assert_eq!(parse_netstat_pids(NETSTAT, 8080), vec![5120]);
        assert_eq!(parse_netstat_pids(NETSTAT, 18080), vec![9000]);
        assert!(parse_netstat_pids(NETSTAT, 9999).is_empty());
    }

    #[test]
    fn platform_selects_reclaim_default() {
        assert!(!for_platform(Platform::Posix).reclaims_ports_by_default());
        assert!(for_platform(Platform::Windows).reclaims_ports_by_default());
    }
}
