// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling ignore globs and the tracked-extension filter.
//! - Walking the tree and keeping the set of watched directories, including
//!   directories created after startup.
//! - Coalescing bursts of changes into single rebuild notifications.
//!
//! It does **not** know about builds or processes; it only turns filesystem
//! activity into [`RebuildSignal`]s.

pub mod debounce;
pub mod detector;
pub mod event;
pub mod event_handler;
pub mod path_utils;
pub mod patterns;
pub mod registry;
pub mod walker;

pub use debounce::{DebounceConfig, Debouncer, RebuildSignal};
pub use detector::ChangeDetector;
pub use event::{ChangeKind, FsChange};
pub use patterns::{ExtensionFilter, IgnoreSet, WatchSpec, DEFAULT_EXTENSIONS, DEFAULT_IGNORE};
pub use registry::{DirectoryWatcher, NotifyDirectoryWatcher, WatchedDirectorySet, WatchedDirs};
