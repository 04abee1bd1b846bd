// src/watch/event_handler.rs

//! Event processing logic for file system changes.

use tracing::{debug, info, warn};

use crate::fs::FileSystem;
use crate::watch::debounce::Debouncer;
use crate::watch::event::FsChange;
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::WatchSpec;
use crate::watch::registry::WatchedDirectorySet;
use crate::watch::walker::register_tree;

/// What the detector did with a single change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// Path is outside the root or matched an ignore pattern.
    Ignored,
    /// Extension is not tracked.
    Untracked,
    /// A new directory was registered, with this many directories added
    /// (itself plus any non-ignored subdirectories it already contained).
    DirectoryAdded(usize),
    /// Tracked path, but the kind of change never triggers a rebuild.
    NoRebuild,
    /// Fed into the debouncer; `true` if it opened a new burst.
    Debounced(bool),
}

/// Process a single change event.
///
/// 1. Newly created (or renamed-in) directories are registered before any
///    further events are handled, so changes inside them are observed.
/// 2. Ignored and untracked paths are dropped.
/// 3. Writes, creations and renames are handed to the debouncer.
pub fn process_file_change(
    change: &FsChange,
    spec: &WatchSpec,
    fs: &dyn FileSystem,
    registry: &mut WatchedDirectorySet,
    debouncer: &Debouncer,
) -> ChangeOutcome {
    let Some(rel) = relative_str(spec.root(), &change.path) else {
        debug!(path = ?change.path, "event outside watch root");
        return ChangeOutcome::Ignored;
    };

    if change.kind.may_add_directory() && fs.is_dir(&change.path) {
        if spec.ignore().is_ignored_dir(&rel) {
            debug!(dir = %rel, "new directory is ignored");
            return ChangeOutcome::Ignored;
        }
        return match register_tree(fs, spec, &change.path, registry) {
            Ok(0) => ChangeOutcome::DirectoryAdded(0),
            Ok(added) => {
                info!(dir = %rel, added, "added new directory to watcher");
                ChangeOutcome::DirectoryAdded(added)
            }
            Err(err) => {
                warn!(dir = %rel, error = %err, "failed to watch new directory");
                ChangeOutcome::DirectoryAdded(0)
            }
        };
    }

    if spec.ignore().is_ignored_file(&rel) {
        return ChangeOutcome::Ignored;
    }

    if !spec.extensions().tracks(&change.path) {
        return ChangeOutcome::Untracked;
    }

    if !change.kind.triggers_rebuild() {
        return ChangeOutcome::NoRebuild;
    }

    debug!(path = %rel, kind = ?change.kind, "change qualifies for rebuild");
    ChangeOutcome::Debounced(debouncer.record_activity())
}
