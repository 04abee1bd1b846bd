// src/watch/patterns.rs

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::errors::{HotloopError, Result};
use crate::watch::debounce::DebounceConfig;

/// Ignore patterns used when no `[watch].ignore` list is configured.
pub const DEFAULT_IGNORE: &[&str] = &[
    "temp",
    "temp/*",
    ".git",
    ".git/*",
    "node_modules",
    "node_modules/*",
    "vendor",
    "vendor/*",
    "*.exe",
    "*.tmp",
    "*.log",
];

/// Source, config and text extensions tracked by default. Binaries and logs
/// are deliberately absent.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "go", "mod", "sum", "json", "yaml", "yml", "toml", "xml", "csv", "txt", "env", "ini",
    "conf",
];

/// Compiled ignore globs.
///
/// Patterns are matched against paths relative to the watch root, using
/// forward slashes (e.g. `"vendor/lib.go"`). A pattern without any `/` also
/// matches the last path component, so `node_modules` ignores nested
/// `node_modules` directories too.
#[derive(Clone)]
pub struct IgnoreSet {
    patterns: Vec<String>,
    full: GlobSet,
    basename: GlobSet,
}

impl fmt::Debug for IgnoreSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgnoreSet")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl IgnoreSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut full = GlobSetBuilder::new();
        let mut basename = GlobSetBuilder::new();
        let mut kept = Vec::with_capacity(patterns.len());

        for pat in patterns {
            let pat = pat.as_ref().trim();
            if pat.is_empty() {
                continue;
            }
            let glob = Glob::new(pat).map_err(|e| {
                HotloopError::ConfigError(format!("invalid ignore pattern '{pat}': {e}"))
            })?;
            if !pat.contains('/') {
                basename.add(glob.clone());
            }
            full.add(glob);
            kept.push(pat.to_string());
        }

        let build = |b: GlobSetBuilder| {
            b.build().map_err(|e| {
                HotloopError::ConfigError(format!("building ignore globset: {e}"))
            })
        };

        Ok(Self {
            patterns: kept,
            full: build(full)?,
            basename: build(basename)?,
        })
    }

    /// Ignore set built from [`DEFAULT_IGNORE`].
    pub fn defaults() -> Self {
        // The built-in patterns are all valid globs.
        Self::new(DEFAULT_IGNORE).unwrap_or_else(|_| Self::empty())
    }

    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            full: GlobSet::empty(),
            basename: GlobSet::empty(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    fn matches_entry(&self, rel: &str, is_dir: bool) -> bool {
        if rel.is_empty() {
            return false;
        }
        if self.full.is_match(rel) {
            return true;
        }
        // `vendor/*` should exclude the `vendor` directory itself.
        if is_dir && self.full.is_match(format!("{rel}/")) {
            return true;
        }
        let name = rel.rsplit('/').next().unwrap_or(rel);
        self.basename.is_match(name)
    }

    /// True if `rel` (a directory) or any of its ancestors is ignored.
    pub fn is_ignored_dir(&self, rel: &str) -> bool {
        self.is_ignored(rel, true)
    }

    /// True if the file `rel` or any of its ancestor directories is ignored.
    pub fn is_ignored_file(&self, rel: &str) -> bool {
        self.is_ignored(rel, false)
    }

    fn is_ignored(&self, rel: &str, is_dir: bool) -> bool {
        let rel = rel.trim_end_matches('/');
        for (idx, ch) in rel.char_indices() {
            if ch == '/' && self.matches_entry(&rel[..idx], true) {
                return true;
            }
        }
        self.matches_entry(rel, is_dir)
    }
}

/// Set of tracked file extensions (lowercase, without the leading dot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    extensions: BTreeSet<String>,
}

impl ExtensionFilter {
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Self {
        let extensions = extensions
            .iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    pub fn defaults() -> Self {
        Self::new(DEFAULT_EXTENSIONS)
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    /// Whether changes to `path` may trigger a rebuild.
    ///
    /// Dotfiles such as `.env` count as having the extension `env`.
    pub fn tracks(&self, path: &Path) -> bool {
        let ext = match path.extension() {
            Some(ext) => ext.to_string_lossy().to_lowercase(),
            None => match path.file_name().and_then(|n| n.to_str()) {
                Some(name) if name.starts_with('.') => name[1..].to_lowercase(),
                _ => return false,
            },
        };
        self.extensions.contains(&ext)
    }
}

/// What to watch: root, ignore rules, tracked extensions and debounce timing.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct WatchSpec {
    root: PathBuf,
    ignore: IgnoreSet,
    extensions: ExtensionFilter,
    debounce: DebounceConfig,
}

impl WatchSpec {
    pub fn new(root: impl Into<PathBuf>, ignore: IgnoreSet, extensions: ExtensionFilter) -> Self {
        Self {
            root: root.into(),
            ignore,
            extensions,
            debounce: DebounceConfig::default(),
        }
    }

    /// `WatchSpec` rooted at `root` using the default ignore list and extensions.
    pub fn with_defaults(root: impl Into<PathBuf>) -> Self {
        Self::new(root, IgnoreSet::defaults(), ExtensionFilter::defaults())
    }

    pub fn with_debounce(mut self, debounce: DebounceConfig) -> Self {
        self.debounce = debounce;
        self
    }

    /// Same `WatchSpec` with the root replaced (used once to canonicalize it).
    pub(crate) fn rooted_at(mut self, root: PathBuf) -> Self {
        self.root = root;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ignore(&self) -> &IgnoreSet {
        &self.ignore
    }

    pub fn extensions(&self) -> &ExtensionFilter {
        &self.extensions
    }

    pub fn debounce(&self) -> DebounceConfig {
        self.debounce
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str]) -> IgnoreSet {
        IgnoreSet::new(patterns).unwrap()
    }

    #[test]
    fn vendor_star_excludes_directory_and_contents() {
        let ignore = set(&["vendor/*"]);
        assert!(ignore.is_ignored_dir("vendor"));
        assert!(ignore.is_ignored_file("vendor/lib.go"));
        assert!(ignore.is_ignored_dir("vendor/github.com/pkg"));
        assert!(!ignore.is_ignored_dir("src"));
        assert!(!ignore.is_ignored_file("src/vendor.go"));
    }

    #[test]
    fn bare_names_match_nested_components() {
        let ignore = set(&["node_modules", "*.log"]);
        assert!(ignore.is_ignored_dir("web/node_modules"));
        assert!(ignore.is_ignored_file("web/node_modules/a/index.json"));
        assert!(ignore.is_ignored_file("logs/app.log"));
        assert!(!ignore.is_ignored_file("web/app.json"));
    }

    #[test]
    fn root_is_never_ignored() {
        let ignore = set(&["*"]);
        assert!(!ignore.is_ignored_dir(""));
    }

    #[test]
    fn invalid_glob_is_a_config_error() {
        let err = IgnoreSet::new(&["src/[unclosed"]).unwrap_err();
        assert!(matches!(err, HotloopError::ConfigError(msg) if msg.contains("src/[unclosed")));
    }

    #[test]
    fn extension_filter_handles_case_and_dotfiles() {
        let filter = ExtensionFilter::new(&[".go", "ENV", "yaml"]);
        assert!(filter.tracks(Path::new("cmd/main.go")));
        assert!(filter.tracks(Path::new("config/app.YAML")));
        assert!(filter.tracks(Path::new(".env")));
        assert!(!filter.tracks(Path::new("temp/app.exe")));
        assert!(!filter.tracks(Path::new("Makefile")));
    }

    #[test]
    fn default_extensions_skip_binaries_and_logs() {
        let filter = ExtensionFilter::defaults();
        assert!(filter.tracks(Path::new("go.mod")));
        assert!(!filter.tracks(Path::new("server.log")));
        assert!(!filter.tracks(Path::new("bin/app.exe")));
    }
}
