//! Sift - dump or tree-render a directory through one exclusion pipeline.
//!
//! Sift walks a directory and either concatenates every surviving file into a
//! single text dump (`File: <path>` / `Content:` blocks) or draws an ASCII
//! tree of the surviving entries.
//!
//! # Quick Start
//!
//! ```no_run
//! use sift::builder::Dumper;
//! use sift::sink::WriterSink;
//!
//! let mut sink = WriterSink::new(std::io::stdout());
//! let summary = Dumper::new("./my-project")
//!     .exclude_dirs(["target"])
//!     .exclude_patterns(["*.lock"])
//!     .run(&mut sink)
//!     .unwrap();
//!
//! eprintln!("dumped {} files", summary.files);
//! ```
//!
//! # Modules
//!
//! - [`paths`] - Path normalization for exact-path comparisons
//! - [`filter`] - Exclusion rules (name, exact path, pattern, extension)
//! - [`reader`] - Best-effort text decoding
//! - [`sink`] - Output destinations and dump records
//! - [`walker`] - Depth-first traversal for the dump
//! - [`tree`] - ASCII tree rendering
//! - [`builder`] - Fluent and one-call entry points

pub mod paths;
pub mod filter;
pub mod errors;
pub mod reader;
pub mod sink;
pub mod walker;
pub mod tree;
pub mod builder;

// Re-export key types at crate root for convenience
pub use builder::{print_tree, process, Dumper};
pub use errors::SiftError;
pub use filter::{is_excluded, BlacklistConfig, ExclusionReason, ExclusionRules};
pub use paths::normalize;
pub use reader::{read_text, EncodingDetector, HeuristicDetector, ReadError};
pub use sink::{DumpRecord, OutputError, RecordBody, Sink};
pub use tree::{render_tree, TreeFilter, TreeLine};
pub use walker::{walk, DumpSummary, Entry, EntryKind, WalkError};
