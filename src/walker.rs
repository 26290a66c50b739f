//! Directory traversal for the dump projection.
//!
//! The walk is depth-first and synchronous, driven by [`ignore::WalkBuilder`]
//! with its gitignore and hidden-file rules switched off. Every child goes
//! through the [`ExclusionRules`] before it is yielded, so excluded
//! directories are never entered. Kept files are read and handed to the
//! [`Sink`]. A subtree's records are contiguous in the sink because each
//! directory is finished before its parent moves on.
//!
//! Children are visited in the order the filesystem lists them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ignore::WalkBuilder;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::filter::ExclusionRules;
use crate::reader::{read_text_with, EncodingDetector, HeuristicDetector};
use crate::sink::{DumpRecord, OutputError, Sink};

/// A directory that could not be listed. Reported through
/// [`Sink::notice`]; never fatal to the walk.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("path not found: {path}")]
    NotFound { path: PathBuf },

    #[error("permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("symlink loop at {path}")]
    Loop { path: PathBuf },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WalkError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        let path = path.to_path_buf();
        match source.kind() {
            io::ErrorKind::NotFound => WalkError::NotFound { path },
            io::ErrorKind::PermissionDenied => WalkError::PermissionDenied { path },
            _ => WalkError::Io { path, source },
        }
    }

    /// Unwrap the path and depth layers `ignore` puts around an error.
    fn from_walk(path: &Path, err: ignore::Error) -> Self {
        match err {
            ignore::Error::WithPath { path, err } => Self::from_walk(&path, *err),
            ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
                Self::from_walk(path, *err)
            }
            ignore::Error::Loop { child, .. } => WalkError::Loop { path: child },
            ignore::Error::Io(source) => Self::from_io(path, source),
            other => WalkError::Io {
                path: path.to_path_buf(),
                source: io::Error::other(other),
            },
        }
    }
}

/// What an entry is, following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Broken symlinks, sockets, entries that vanished after listing.
    Other,
}

impl EntryKind {
    fn probe(path: &Path) -> Self {
        match fs::metadata(path) {
            Ok(meta) => Self::from_file_type(meta.file_type()),
            Err(_) => EntryKind::Other,
        }
    }

    fn from_file_type(file_type: fs::FileType) -> Self {
        if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }
}

/// A filesystem object met during a walk.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Absolute path.
    pub path: PathBuf,
    /// Path relative to the walk root.
    pub relative: PathBuf,
    pub kind: EntryKind,
}

impl Entry {
    /// Probe `root/relative` on disk.
    pub fn new(root: &Path, relative: impl Into<PathBuf>) -> Self {
        let relative = relative.into();
        let path = root.join(&relative);
        let kind = EntryKind::probe(&path);
        Self {
            path,
            relative,
            kind,
        }
    }

    /// Wrap an entry yielded by the walker. Its file type already follows
    /// symlinks.
    fn from_dir_entry(root: &Path, dent: &ignore::DirEntry) -> Self {
        let path = dent.path().to_path_buf();
        let relative = path
            .strip_prefix(root)
            .map_or_else(|_| path.clone(), Path::to_path_buf);
        let kind = dent
            .file_type()
            .map_or(EntryKind::Other, EntryKind::from_file_type);
        Self {
            path,
            relative,
            kind,
        }
    }
}

/// Counts gathered over one dump. Purely informational: a walk with read
/// errors still completes normally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DumpSummary {
    /// Records emitted, including those carrying a read error.
    pub files: usize,
    /// Records carrying a read error.
    pub errors: usize,
    /// Entries dropped by the exclusion rules.
    pub excluded: usize,
    /// Directories that could not be listed.
    pub listing_failures: usize,
}

/// Walk `root/current` and emit every kept file to `sink`.
///
/// `root` must already be absolute and resolved. Listing failures go to
/// [`Sink::notice`] and read failures become error records; only a failing
/// sink stops the walk.
///
/// # Examples
///
/// ```no_run
/// use sift::filter::ExclusionRules;
/// use sift::sink::MemorySink;
/// use sift::walker::walk;
/// use std::path::Path;
///
/// let root = Path::new("/srv/project");
/// let mut sink = MemorySink::new();
/// walk(root, Path::new(""), &mut sink, true, &ExclusionRules::default()).unwrap();
/// for record in &sink.records {
///     println!("{}", record.path.display());
/// }
/// ```
pub fn walk(
    root: &Path,
    current: &Path,
    sink: &mut dyn Sink,
    recursive: bool,
    rules: &ExclusionRules,
) -> Result<DumpSummary, OutputError> {
    walk_with_detector(root, current, sink, recursive, rules, &HeuristicDetector)
}

/// [`walk`] with a custom encoding detector.
pub fn walk_with_detector(
    root: &Path,
    current: &Path,
    sink: &mut dyn Sink,
    recursive: bool,
    rules: &ExclusionRules,
    detector: &dyn EncodingDetector,
) -> Result<DumpSummary, OutputError> {
    let base = root.join(current);
    let mut summary = DumpSummary::default();

    match fs::metadata(&base) {
        Ok(meta) if meta.is_dir() => {
            let excluded = Arc::new(AtomicUsize::new(0));
            let walker = build_walker(root, &base, recursive, rules, Arc::clone(&excluded));

            for result in walker {
                match result {
                    Ok(dent) if dent.depth() == 0 => {}
                    Ok(dent) => {
                        let entry = Entry::from_dir_entry(root, &dent);
                        visit(&entry, sink, recursive, detector, &mut summary)?;
                    }
                    Err(err) => match WalkError::from_walk(&base, err) {
                        // Dangling symlinks and entries removed mid-walk.
                        WalkError::NotFound { path } => {
                            debug!(path = %path.display(), "entry vanished");
                        }
                        failure => report(failure, sink, &mut summary)?,
                    },
                }
            }

            summary.excluded = excluded.load(Ordering::Relaxed);
        }
        Ok(_) => {
            let source = io::Error::other("not a directory");
            report(WalkError::from_io(&base, source), sink, &mut summary)?;
        }
        Err(err) => report(WalkError::from_io(&base, err), sink, &mut summary)?,
    }

    info!(
        files = summary.files,
        errors = summary.errors,
        excluded = summary.excluded,
        listing_failures = summary.listing_failures,
        "dump finished"
    );
    Ok(summary)
}

fn build_walker(
    root: &Path,
    base: &Path,
    recursive: bool,
    rules: &ExclusionRules,
    excluded: Arc<AtomicUsize>,
) -> ignore::Walk {
    let root = root.to_path_buf();
    let rules = rules.clone();

    let mut builder = WalkBuilder::new(base);
    builder.standard_filters(false).follow_links(true);

    if !recursive {
        builder.max_depth(Some(1));
    }

    builder.filter_entry(move |dent| {
        if dent.depth() == 0 {
            return true;
        }
        let entry = Entry::from_dir_entry(&root, dent);
        match rules.exclusion_reason(&entry, &root) {
            Some(reason) => {
                debug!(path = %entry.relative.display(), %reason, "excluded");
                excluded.fetch_add(1, Ordering::Relaxed);
                false
            }
            None => true,
        }
    });

    builder.build()
}

fn visit(
    entry: &Entry,
    sink: &mut dyn Sink,
    recursive: bool,
    detector: &dyn EncodingDetector,
    summary: &mut DumpSummary,
) -> Result<(), OutputError> {
    match entry.kind {
        EntryKind::File => {
            let read = read_text_with(&entry.path, detector);
            if let Err(err) = &read {
                warn!(path = %entry.relative.display(), %err, "cannot read file");
                summary.errors += 1;
            }
            summary.files += 1;
            sink.record(&DumpRecord::from_read(&entry.relative, read))
        }
        EntryKind::Directory if !recursive => {
            debug!(path = %entry.relative.display(), "not recursing");
            Ok(())
        }
        EntryKind::Directory => Ok(()),
        EntryKind::Other => {
            debug!(path = %entry.relative.display(), "neither file nor directory");
            Ok(())
        }
    }
}

fn report(
    failure: WalkError,
    sink: &mut dyn Sink,
    summary: &mut DumpSummary,
) -> Result<(), OutputError> {
    warn!(%failure, "cannot list directory");
    summary.listing_failures += 1;
    sink.notice(&failure)
}
