//! Exclusion rules for the dump projection.
//!
//! Four independent rule categories decide whether an entry is visible:
//! a name blacklist checked against every path component, exact-path
//! excludes for directories and files, substring-or-glob patterns, and an
//! extension blacklist for files. Evaluation is a pure function of the entry,
//! the rules and the root, so the verdict never depends on traversal order.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use glob::Pattern;
use tracing::debug;

use crate::paths::normalize;
use crate::walker::{Entry, EntryKind};

/// Directory names excluded wherever they appear in a path.
pub const DEFAULT_BLACKLIST_NAMES: &[&str] = &[".git", ".vscode", "__pycache__"];

/// File suffixes that are never dumped.
pub const DEFAULT_BLACKLIST_EXTENSIONS: &[&str] = &[".ipynb", ".pyc", ".csv", ".pth", ".parquet"];

/// Blacklists applied on top of the caller's own excludes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlacklistConfig {
    /// Path component names, matched exactly.
    pub names: BTreeSet<String>,
    /// File suffixes including the leading dot (e.g. `.pyc`).
    pub extensions: BTreeSet<String>,
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            names: DEFAULT_BLACKLIST_NAMES.iter().map(|s| s.to_string()).collect(),
            extensions: DEFAULT_BLACKLIST_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl BlacklistConfig {
    /// Blacklists with nothing in them.
    pub fn empty() -> Self {
        Self {
            names: BTreeSet::new(),
            extensions: BTreeSet::new(),
        }
    }

    /// Add a component name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    /// Add a suffix. A missing leading dot is added.
    pub fn with_extension(mut self, ext: impl AsRef<str>) -> Self {
        let ext = ext.as_ref();
        if ext.starts_with('.') {
            self.extensions.insert(ext.to_string());
        } else {
            self.extensions.insert(format!(".{ext}"));
        }
        self
    }
}

/// A caller-supplied exclusion pattern.
///
/// Matches when the pattern occurs as a substring of the candidate, or when
/// the candidate matches it as a shell glob (`*`, `?`, `[...]`). Runs of `*`
/// collapse to one, so there is no recursive `**` and `*` crosses `/`.
#[derive(Debug, Clone)]
pub struct ExcludePattern {
    raw: String,
    glob: Option<Pattern>,
}

impl ExcludePattern {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let glob = compile_glob(&raw);
        Self { raw, glob }
    }

    /// The pattern as supplied.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Substring containment or glob match.
    pub fn matches(&self, candidate: &str) -> bool {
        candidate.contains(&self.raw) || self.matches_glob(candidate)
    }

    /// Glob match only.
    pub fn matches_glob(&self, candidate: &str) -> bool {
        match &self.glob {
            Some(glob) => glob.matches(candidate),
            None => candidate == self.raw,
        }
    }
}

fn compile_glob(raw: &str) -> Option<Pattern> {
    let mut collapsed = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '*' && collapsed.ends_with('*') {
            continue;
        }
        collapsed.push(c);
    }

    let err = match Pattern::new(&collapsed) {
        Ok(pattern) => return Some(pattern),
        Err(err) => err,
    };

    // An unclosed `[` is the usual culprit; match it literally and keep the
    // wildcards around it.
    let escaped = escape_open_brackets(&collapsed);
    match Pattern::new(&escaped) {
        Ok(pattern) => {
            debug!(pattern = raw, %err, "unclosed bracket, matching it literally");
            Some(pattern)
        }
        Err(_) => {
            debug!(pattern = raw, %err, "not a valid glob, matching literally");
            Pattern::new(&Pattern::escape(raw)).ok()
        }
    }
}

/// Rewrite every `[` that does not open a complete class as `[[]`.
fn escape_open_brackets(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 4);
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '[' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        // A class holds at least one member, so its `]` is two or more
        // characters after the `[`.
        let close = chars
            .get(i + 2..)
            .and_then(|rest| rest.iter().position(|&c| c == ']'))
            .map(|offset| i + 2 + offset);

        match close {
            Some(end) => {
                out.extend(&chars[i..=end]);
                i = end + 1;
            }
            None => {
                out.push_str("[[]");
                i += 1;
            }
        }
    }

    out
}

/// Which rule category excluded an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    BlacklistedName,
    ExactPath,
    Pattern,
    Extension,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::BlacklistedName => write!(f, "blacklisted name"),
            ExclusionReason::ExactPath => write!(f, "excluded path"),
            ExclusionReason::Pattern => write!(f, "pattern"),
            ExclusionReason::Extension => write!(f, "blacklisted extension"),
        }
    }
}

/// The full rule set for one dump invocation. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    blacklist: BlacklistConfig,
    exclude_dirs: HashSet<PathBuf>,
    exclude_files: HashSet<PathBuf>,
    patterns: Vec<ExcludePattern>,
}

impl ExclusionRules {
    /// Build rules for `root`. Exact paths may be absolute or relative to
    /// `root` and are normalized here, once.
    pub fn new<D, F, P>(root: &Path, exclude_dirs: D, exclude_files: F, patterns: P) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<Path>,
        F: IntoIterator,
        F::Item: AsRef<Path>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            blacklist: BlacklistConfig::default(),
            exclude_dirs: exclude_dirs
                .into_iter()
                .map(|p| normalize(p.as_ref(), root))
                .collect(),
            exclude_files: exclude_files
                .into_iter()
                .map(|p| normalize(p.as_ref(), root))
                .collect(),
            patterns: patterns.into_iter().map(ExcludePattern::new).collect(),
        }
    }

    /// Replace the blacklists.
    pub fn with_blacklist(mut self, blacklist: BlacklistConfig) -> Self {
        self.blacklist = blacklist;
        self
    }

    pub fn blacklist(&self) -> &BlacklistConfig {
        &self.blacklist
    }

    /// First rule category that excludes `entry`, if any.
    pub fn exclusion_reason(&self, entry: &Entry, root: &Path) -> Option<ExclusionReason> {
        if self.has_blacklisted_component(&entry.path) {
            return Some(ExclusionReason::BlacklistedName);
        }

        if self.is_excluded_path(entry, root) {
            return Some(ExclusionReason::ExactPath);
        }

        let posix = to_posix(&entry.path);
        if self.patterns.iter().any(|p| p.matches(&posix)) {
            return Some(ExclusionReason::Pattern);
        }

        if entry.kind == EntryKind::File && self.has_blacklisted_extension(&entry.path) {
            return Some(ExclusionReason::Extension);
        }

        None
    }

    /// Whether `entry` is dropped from the walk.
    pub fn is_excluded(&self, entry: &Entry, root: &Path) -> bool {
        self.exclusion_reason(entry, root).is_some()
    }

    fn has_blacklisted_component(&self, path: &Path) -> bool {
        path.components().any(|c| match c {
            Component::Normal(name) => name
                .to_str()
                .is_some_and(|name| self.blacklist.names.contains(name)),
            _ => false,
        })
    }

    fn is_excluded_path(&self, entry: &Entry, root: &Path) -> bool {
        let set = match entry.kind {
            EntryKind::Directory => &self.exclude_dirs,
            EntryKind::File => &self.exclude_files,
            EntryKind::Other => return false,
        };
        if set.is_empty() {
            return false;
        }
        set.contains(&normalize(&entry.relative, root))
    }

    fn has_blacklisted_extension(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| {
            let suffix = format!(".{}", ext.to_string_lossy());
            self.blacklist.extensions.contains(&suffix)
        })
    }
}

/// Free-function form of [`ExclusionRules::is_excluded`].
pub fn is_excluded(entry: &Entry, root: &Path, rules: &ExclusionRules) -> bool {
    rules.is_excluded(entry, root)
}

/// Render a path with forward slashes.
pub fn to_posix(path: &Path) -> String {
    let s = path.to_string_lossy();
    if cfg!(windows) {
        s.replace('\\', "/")
    } else {
        s.into_owned()
    }
}
