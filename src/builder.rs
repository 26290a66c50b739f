//! Entry points for the dump and tree projections.
//!
//! [`Dumper`] is the fluent form; [`process`] and [`print_tree`] are the
//! one-call forms used by the CLI.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::errors::SiftError;
use crate::filter::{BlacklistConfig, ExclusionRules};
use crate::paths::resolve_root;
use crate::reader::{EncodingDetector, HeuristicDetector};
use crate::sink::{ConsoleSink, Sink, WriterSink};
use crate::tree::{write_tree, TreeFilter};
use crate::walker::{walk_with_detector, DumpSummary};

/// Builder for dumping a directory.
///
/// # Examples
///
/// ```no_run
/// use sift::builder::Dumper;
/// use sift::sink::MemorySink;
///
/// let mut sink = MemorySink::new();
/// let summary = Dumper::new("./project")
///     .recursive(true)
///     .exclude_dirs(["target"])
///     .exclude_patterns(["*.lock"])
///     .run(&mut sink)
///     .unwrap();
///
/// println!("{} files, {} unreadable", summary.files, summary.errors);
/// ```
pub struct Dumper {
    root: PathBuf,
    recursive: bool,
    exclude_dirs: Vec<PathBuf>,
    exclude_files: Vec<PathBuf>,
    exclude_patterns: Vec<String>,
    blacklist: BlacklistConfig,
    detector: Box<dyn EncodingDetector>,
}

impl Dumper {
    /// Create a new builder for the given root path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: true,
            exclude_dirs: Vec::new(),
            exclude_files: Vec::new(),
            exclude_patterns: Vec::new(),
            blacklist: BlacklistConfig::default(),
            detector: Box::new(HeuristicDetector),
        }
    }

    /// Descend into subdirectories (default: true).
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Directories to skip, absolute or relative to the root.
    pub fn exclude_dirs<I>(mut self, dirs: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
    {
        self.exclude_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Files to skip, absolute or relative to the root.
    pub fn exclude_files<I>(mut self, files: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
    {
        self.exclude_files.extend(files.into_iter().map(Into::into));
        self
    }

    /// Substring-or-glob patterns matched against absolute paths.
    pub fn exclude_patterns<I>(mut self, patterns: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.exclude_patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Replace the default name and extension blacklists.
    pub fn blacklist(mut self, blacklist: BlacklistConfig) -> Self {
        self.blacklist = blacklist;
        self
    }

    /// Replace the encoding detector.
    pub fn detector(mut self, detector: impl EncodingDetector + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    /// Resolve the root and build the rule set for it.
    pub fn rules(&self) -> Result<(PathBuf, ExclusionRules), SiftError> {
        let root = resolve_root(&self.root).map_err(|source| SiftError::Root {
            path: self.root.clone(),
            source,
        })?;
        let rules = ExclusionRules::new(
            &root,
            &self.exclude_dirs,
            &self.exclude_files,
            self.exclude_patterns.iter().cloned(),
        )
        .with_blacklist(self.blacklist.clone());
        Ok((root, rules))
    }

    /// Walk the root and write every kept file to `sink`.
    pub fn run(self, sink: &mut dyn Sink) -> Result<DumpSummary, SiftError> {
        let (root, rules) = self.rules()?;
        let summary = walk_with_detector(
            &root,
            Path::new(""),
            sink,
            self.recursive,
            &rules,
            self.detector.as_ref(),
        )?;
        sink.finish()?;
        Ok(summary)
    }
}

/// Dump `root_dir` to `output` (appended) or to the console.
pub fn process(
    root_dir: impl Into<PathBuf>,
    output: Option<&Path>,
    recursive: bool,
    exclude_dirs: &[PathBuf],
    exclude_files: &[PathBuf],
    exclude_patterns: &[String],
) -> Result<DumpSummary, SiftError> {
    let dumper = Dumper::new(root_dir)
        .recursive(recursive)
        .exclude_dirs(exclude_dirs.iter().cloned())
        .exclude_files(exclude_files.iter().cloned())
        .exclude_patterns(exclude_patterns.iter().cloned());

    match output {
        Some(path) => dumper.run(&mut WriterSink::append(path)?),
        None => dumper.run(&mut ConsoleSink),
    }
}

/// Print the tree below `path` to stdout.
pub fn print_tree(
    path: &Path,
    exclude_names: &[String],
    exclude_patterns: &[String],
) -> io::Result<()> {
    let filter = TreeFilter::new(
        exclude_names.iter().cloned(),
        exclude_patterns.iter().cloned(),
    );
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    write_tree(path, &filter, &mut out)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_project() -> TempDir {
        let dir = TempDir::new().unwrap();

        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(dir.path().join("src/lib.rs"), "pub fn hello() {}\n").unwrap();
        fs::write(dir.path().join("target/debug/app.txt"), "binary-ish").unwrap();
        fs::write(dir.path().join("Cargo.lock"), "# lock").unwrap();
        fs::write(dir.path().join("README.md"), "# readme").unwrap();

        dir
    }

    fn paths(sink: &MemorySink) -> BTreeSet<PathBuf> {
        sink.records.iter().map(|r| r.path.clone()).collect()
    }

    #[test]
    fn test_dumper_defaults() {
        let dir = create_test_project();
        let mut sink = MemorySink::new();

        let summary = Dumper::new(dir.path()).run(&mut sink).unwrap();

        assert_eq!(summary.files, 5);
        assert_eq!(summary.errors, 0);
        assert!(sink.find("src/main.rs").is_some());
    }

    #[test]
    fn test_dumper_excludes() {
        let dir = create_test_project();
        let mut sink = MemorySink::new();

        Dumper::new(dir.path())
            .exclude_dirs(["target"])
            .exclude_files([dir.path().join("README.md")])
            .exclude_patterns(["*.lock"])
            .run(&mut sink)
            .unwrap();

        assert_eq!(
            paths(&sink),
            BTreeSet::from([PathBuf::from("src/main.rs"), PathBuf::from("src/lib.rs")])
        );
    }

    #[test]
    fn test_dumper_non_recursive() {
        let dir = create_test_project();
        let mut sink = MemorySink::new();

        Dumper::new(dir.path())
            .recursive(false)
            .run(&mut sink)
            .unwrap();

        assert_eq!(
            paths(&sink),
            BTreeSet::from([PathBuf::from("Cargo.lock"), PathBuf::from("README.md")])
        );
    }

    #[test]
    fn test_dumper_relative_excludes_with_dotdot() {
        let dir = create_test_project();
        let mut sink = MemorySink::new();

        Dumper::new(dir.path())
            .exclude_dirs(["src/../target/"])
            .run(&mut sink)
            .unwrap();

        assert!(!paths(&sink).iter().any(|p| p.starts_with("target")));
        assert!(sink.find("src/lib.rs").is_some());
    }

    #[test]
    fn test_dumper_missing_root_completes() {
        let dir = TempDir::new().unwrap();
        let mut sink = MemorySink::new();

        let summary = Dumper::new(dir.path().join("absent"))
            .run(&mut sink)
            .unwrap();

        assert_eq!(summary.files, 0);
        assert_eq!(summary.listing_failures, 1);
        assert_eq!(sink.notices.len(), 1);
    }

    #[test]
    fn test_process_appends_to_output() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("a.txt"), "hi").unwrap();
        let out = dir.path().join("dump.txt");

        process(&root, Some(&out), true, &[], &[], &[]).unwrap();
        process(&root, Some(&out), true, &[], &[], &[]).unwrap();

        let text = fs::read_to_string(&out).unwrap();
        assert_eq!(
            text,
            "File: a.txt\n\nContent:\nhi\n\nFile: a.txt\n\nContent:\nhi\n\n"
        );
    }
}
