// src/watch/walker.rs

use std::path::Path;

use anyhow::Context;
use tracing::debug;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::WatchSpec;
use crate::watch::registry::WatchedDirectorySet;

/// Register `start` and every non-ignored directory below it.
///
/// `start` is either the watch root (initial walk) or a directory that just
/// appeared under it. Ignored directories are neither registered nor
/// descended into. Symlinked directories are skipped so a link back to an
/// ancestor cannot make the walk loop.
///
/// Returns the number of directories newly registered. Any registration or
/// listing failure aborts the walk.
pub fn register_tree(
    fs: &dyn FileSystem,
    spec: &WatchSpec,
    start: &Path,
    registry: &mut WatchedDirectorySet,
) -> Result<usize> {
    let root = spec.root();
    let mut added = 0;
    let mut stack = vec![start.to_path_buf()];

    while let Some(dir) = stack.pop() {
        if registry.register(&dir)? {
            debug!(dir = ?dir, "watching directory");
            added += 1;
        }

        let entries = fs
            .read_dir(&dir)
            .with_context(|| format!("listing {:?} for watching", dir))?;

        for path in entries {
            if !fs.is_dir(&path) || fs.is_symlink(&path) {
                continue;
            }
            let Some(rel) = relative_str(root, &path) else {
                continue;
            };
            if spec.ignore().is_ignored_dir(&rel) {
                debug!(dir = %rel, "skipping ignored directory");
                continue;
            }
            stack.push(path);
        }
    }

    Ok(added)
}
