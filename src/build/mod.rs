// src/build/mod.rs

//! Build step abstraction.
//!
//! The controller talks to a [`BuildBackend`] instead of spawning the build
//! command itself, so tests can script build results without running a
//! compiler. [`CommandBuilder`] is the real implementation.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::errors::HotloopError;

pub mod invoker;

pub use invoker::CommandBuilder;

/// Outcome of one build.
#[derive(Debug)]
pub struct BuildResult {
    pub success: bool,
    pub duration: Duration,
    /// Captured stdout followed by stderr.
    pub output: String,
    /// Why the build failed; `None` on success.
    pub failure: Option<HotloopError>,
}

impl BuildResult {
    pub fn succeeded(duration: Duration, output: impl Into<String>) -> Self {
        Self {
            success: true,
            duration,
            output: output.into(),
            failure: None,
        }
    }

    pub fn failed(duration: Duration, output: impl Into<String>, failure: HotloopError) -> Self {
        Self {
            success: false,
            duration,
            output: output.into(),
            failure: Some(failure),
        }
    }
}

/// Something that can produce a fresh build on demand.
pub trait BuildBackend: Send {
    /// Run one build to completion. Never panics on build failure; failures
    /// are reported through [`BuildResult`].
    fn build(&mut self) -> Pin<Box<dyn Future<Output = BuildResult> + Send + '_>>;
}
