// src/engine/core.rs

use crate::build::BuildResult;

use super::CoreCommand;

/// Decide what to do with a finished build.
///
/// A successful build always replaces the running process, even if the
/// previous cycle also succeeded. A failed build never touches it, so the
/// last good version keeps serving.
pub fn decide(result: &BuildResult) -> CoreCommand {
    if result.success {
        CoreCommand::Restart
    } else {
        CoreCommand::KeepCurrent
    }
}
