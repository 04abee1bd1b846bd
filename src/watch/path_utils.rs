// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
/// - Only if both attempts fail do we give up.
///
/// The root itself maps to `""`. Returns `None` if the path cannot be
/// related to `root` (deleted files outside the root prefix, for example).
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    // Fast path: event path already starts with our root.
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(normalize(rel));
    }

    // macOS reports /private/var/... for /var/... and similar.
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(normalize(rel));
        }
    }

    None
}

fn normalize(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}
