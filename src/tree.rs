//! ASCII tree rendering.
//!
//! A lighter traversal than the dump: each directory is listed with a
//! one-level [`WalkBuilder`], children are filtered by exact name and by glob
//! on the name only, sorted, and drawn with box-drawing connectors. Every
//! kept directory is entered.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;
use tracing::warn;

use crate::filter::ExcludePattern;

/// Box-drawing characters for tree rendering.
const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const VERTICAL: &str = "│   ";
const SPACE: &str = "    ";

/// Name-level filter for the tree projection.
#[derive(Debug, Clone, Default)]
pub struct TreeFilter {
    names: HashSet<String>,
    patterns: Vec<ExcludePattern>,
}

impl TreeFilter {
    pub fn new<N, P>(names: N, patterns: P) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            patterns: patterns.into_iter().map(ExcludePattern::new).collect(),
        }
    }

    /// Whether a child called `name` is hidden from the tree.
    pub fn excludes(&self, name: &str) -> bool {
        self.names.contains(name) || self.patterns.iter().any(|p| p.matches_glob(name))
    }
}

/// Connector drawn in front of a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    Branch,
    Last,
}

impl Connector {
    pub fn as_str(self) -> &'static str {
        match self {
            Connector::Branch => BRANCH,
            Connector::Last => LAST_BRANCH,
        }
    }
}

/// One rendered line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLine {
    /// Indentation built from the ancestors' "is last" state.
    pub prefix: String,
    pub connector: Connector,
    pub name: String,
    /// 0 for children of the rendered directory.
    pub depth: usize,
}

impl fmt::Display for TreeLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.prefix, self.connector.as_str(), self.name)
    }
}

/// Collect the tree below `path`.
pub fn tree_lines(path: &Path, filter: &TreeFilter) -> Vec<TreeLine> {
    let filter = Arc::new(filter.clone());
    let mut lines = Vec::new();
    // Collecting into a Vec cannot fail.
    let _ = visit(path, "", 0, &filter, &mut |line: TreeLine| {
        lines.push(line);
        Ok(())
    });
    lines
}

/// Render the tree below `path` to a string, one line per entry.
///
/// # Examples
///
/// ```no_run
/// use sift::tree::{render_tree, TreeFilter};
/// use std::path::Path;
///
/// let filter = TreeFilter::new(["target"], ["*.egg-info"]);
/// print!("{}", render_tree(Path::new("."), &filter));
/// ```
pub fn render_tree(path: &Path, filter: &TreeFilter) -> String {
    // Pre-allocate for typical tree size
    let mut output = String::with_capacity(4096);
    for line in tree_lines(path, filter) {
        output.push_str(&line.to_string());
        output.push('\n');
    }
    output
}

/// Stream the tree below `path` to `out` as it is walked.
pub fn write_tree(path: &Path, filter: &TreeFilter, out: &mut dyn Write) -> io::Result<()> {
    let filter = Arc::new(filter.clone());
    visit(path, "", 0, &filter, &mut |line: TreeLine| writeln!(out, "{line}"))
}

fn visit(
    dir: &Path,
    prefix: &str,
    depth: usize,
    filter: &Arc<TreeFilter>,
    emit: &mut dyn FnMut(TreeLine) -> io::Result<()>,
) -> io::Result<()> {
    let children = match list_children(dir, filter) {
        Ok(children) => children,
        Err(err) => {
            warn!(path = %dir.display(), %err, "cannot list directory");
            return emit(TreeLine {
                prefix: prefix.to_string(),
                connector: Connector::Last,
                name: placeholder(&err),
                depth,
            });
        }
    };

    let count = children.len();
    for (i, (name, full_path)) in children.into_iter().enumerate() {
        let is_last = i + 1 == count;
        let is_dir = fs::metadata(&full_path).is_ok_and(|m| m.is_dir());

        emit(TreeLine {
            prefix: prefix.to_string(),
            connector: if is_last { Connector::Last } else { Connector::Branch },
            name,
            depth,
        })?;

        if is_dir {
            let continuation = if is_last { SPACE } else { VERTICAL };
            let child_prefix = format!("{prefix}{continuation}");
            visit(&full_path, &child_prefix, depth + 1, filter, emit)?;
        }
    }

    Ok(())
}

/// Kept children of `dir`, sorted by name. Symlinks are not followed here;
/// [`visit`] decides whether a child is a directory.
fn list_children(
    dir: &Path,
    filter: &Arc<TreeFilter>,
) -> Result<Vec<(String, PathBuf)>, ignore::Error> {
    let filter = Arc::clone(filter);
    let mut builder = WalkBuilder::new(dir);
    builder
        .standard_filters(false)
        .max_depth(Some(1))
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |dent| {
            dent.depth() == 0 || !filter.excludes(&dent.file_name().to_string_lossy())
        });

    let mut children = Vec::new();
    for result in builder.build() {
        let dent = result?;
        if dent.depth() > 0 {
            let name = dent.file_name().to_string_lossy().into_owned();
            children.push((name, dent.into_path()));
        }
    }
    Ok(children)
}

fn placeholder(err: &ignore::Error) -> String {
    match err.io_error() {
        Some(io_err) if io_err.kind() == io::ErrorKind::PermissionDenied => {
            "[Permission denied]".to_string()
        }
        Some(io_err) if io_err.kind() == io::ErrorKind::NotFound => {
            "[Path not found]".to_string()
        }
        Some(io_err) => format!("[Error: {io_err}]"),
        None => format!("[Error: {err}]"),
    }
}
