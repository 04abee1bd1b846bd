// src/exec/command.rs

use std::fmt;

use tokio::process::Command;

use crate::errors::{HotloopError, Result};

/// A command string split into program and arguments.
///
/// Splitting is plain whitespace splitting; there is no shell quoting.
/// Wrap the command in `sh -c`/`cmd /C` yourself if you need a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    /// Split `cmd`. `what` names the command in the error ("build", "run").
    pub fn parse(cmd: &str, what: &str) -> Result<Self> {
        let mut parts = cmd.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| HotloopError::ConfigError(format!("invalid {what} command: {cmd:?}")))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Value following an `-o` flag, if any (e.g. `go build -o ./temp/app`).
    pub fn output_path(&self) -> Option<&str> {
        self.args
            .windows(2)
            .find(|w| w[0] == "-o")
            .map(|w| w[1].as_str())
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
