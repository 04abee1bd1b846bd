// src/build/invoker.rs

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::build::{BuildBackend, BuildResult};
use crate::errors::HotloopError;
use crate::exec::command::CommandLine;
use crate::fs::{FileSystem, RealFileSystem};

/// Runs a build command string to completion.
pub struct CommandBuilder {
    command: String,
    fs: Arc<dyn FileSystem>,
}

impl fmt::Debug for CommandBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuilder")
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

impl CommandBuilder {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            fs: Arc::new(RealFileSystem),
        }
    }

    /// Use `fs` to prepare the output directory.
    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    async fn run(&self) -> BuildResult {
        let started = Instant::now();

        let line = match CommandLine::parse(&self.command, "build") {
            Ok(line) => line,
            Err(err) => return BuildResult::failed(Duration::ZERO, String::new(), err),
        };

        if let Some(out) = line.output_path() {
            self.prepare_output_dir(Path::new(out));
        }

        info!(command = %line, "building");
        let output = line
            .to_command()
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(source) => {
                let err = HotloopError::Launch {
                    command: line.to_string(),
                    source,
                };
                return BuildResult::failed(started.elapsed(), String::new(), err);
            }
        };

        let duration = started.elapsed();
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            info!(?duration, "build succeeded");
            BuildResult::succeeded(duration, combined)
        } else {
            let err = HotloopError::BuildFailed {
                command: line.to_string(),
                status: output.status.to_string(),
            };
            BuildResult::failed(duration, combined, err)
        }
    }

    fn prepare_output_dir(&self, out: &Path) {
        let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return;
        };
        if self.fs.is_dir(parent) {
            return;
        }
        match self.fs.create_dir_all(parent) {
            Ok(()) => debug!(dir = ?parent, "created build output directory"),
            // The build itself will report the real problem.
            Err(err) => warn!(dir = ?parent, error = %err, "could not create build output directory"),
        }
    }
}

impl BuildBackend for CommandBuilder {
    fn build(&mut self) -> Pin<Box<dyn Future<Output = BuildResult> + Send + '_>> {
        Box::pin(self.run())
    }
}
