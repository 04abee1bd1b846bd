// src/watch/event.rs

use std::path::PathBuf;

use notify::event::ModifyKind;
use notify::{Event, EventKind};

/// Coarse classification of a raw filesystem event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Write,
    Rename,
    Remove,
    /// Access, metadata-only changes and anything else we never act on.
    Other,
}

impl ChangeKind {
    pub fn from_event_kind(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => ChangeKind::Create,
            EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Rename,
            EventKind::Modify(ModifyKind::Metadata(_)) => ChangeKind::Other,
            EventKind::Modify(_) => ChangeKind::Write,
            EventKind::Remove(_) => ChangeKind::Remove,
            _ => ChangeKind::Other,
        }
    }

    /// Writes, creations and renames feed the debouncer; removals do not.
    pub fn triggers_rebuild(self) -> bool {
        matches!(self, ChangeKind::Create | ChangeKind::Write | ChangeKind::Rename)
    }

    /// Kinds after which `path` may be a directory that needs watching.
    pub fn may_add_directory(self) -> bool {
        matches!(self, ChangeKind::Create | ChangeKind::Rename)
    }
}

/// A single path-level change fed into the detector's event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsChange {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl FsChange {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Create, path)
    }

    pub fn write(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Write, path)
    }
}

/// Split a notify event into one change per path.
pub fn changes_from_event(event: Event) -> Vec<FsChange> {
    let kind = ChangeKind::from_event_kind(&event.kind);
    event
        .paths
        .into_iter()
        .map(|path| FsChange { kind, path })
        .collect()
}
