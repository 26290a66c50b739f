//! Output sinks for the dump projection.
//!
//! A walk hands every kept file to a [`Sink`] as a [`DumpRecord`], and every
//! listing failure to the sink's side channel, [`Sink::notice`].

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::filter::to_posix;
use crate::reader::ReadError;
use crate::walker::WalkError;

/// Errors raised when the sink itself cannot be written.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// What was read for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordBody {
    Content(String),
    Error(String),
}

/// One dumped file: its path relative to the root and its text or the
/// reason it could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRecord {
    pub path: PathBuf,
    pub body: RecordBody,
}

impl DumpRecord {
    pub fn content(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            body: RecordBody::Content(content.into()),
        }
    }

    pub fn error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            body: RecordBody::Error(message.into()),
        }
    }

    /// Pair a relative path with the outcome of reading it.
    pub fn from_read(path: impl Into<PathBuf>, read: Result<String, ReadError>) -> Self {
        match read {
            Ok(content) => Self::content(path, content),
            Err(err) => Self::error(path, err.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.body, RecordBody::Error(_))
    }
}

impl fmt::Display for DumpRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path.display();
        write!(f, "File: {path}\n\n")?;
        match &self.body {
            RecordBody::Content(content) => write!(f, "Content:\n{content}\n\n"),
            RecordBody::Error(message) => {
                write!(f, "Error reading file {path}: {message}\n\n")
            }
        }
    }
}

/// Destination for dump output.
pub trait Sink {
    /// Write one record.
    fn record(&mut self, record: &DumpRecord) -> Result<(), OutputError>;

    /// Report a directory that could not be listed. Not part of the dump.
    fn notice(&mut self, failure: &WalkError) -> Result<(), OutputError> {
        eprintln!("{failure}");
        Ok(())
    }

    /// Flush buffered output. Called once when the walk is done.
    fn finish(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}

/// Writes text blocks to any [`Write`] implementation.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Open `path` for appending, creating it if needed.
pub fn open_append(path: &Path) -> Result<BufWriter<File>, OutputError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

impl WriterSink<BufWriter<File>> {
    /// Text sink appending to `path`.
    pub fn append(path: &Path) -> Result<Self, OutputError> {
        Ok(Self::new(open_append(path)?))
    }
}

impl<W: Write> Sink for WriterSink<W> {
    fn record(&mut self, record: &DumpRecord) -> Result<(), OutputError> {
        write!(self.writer, "{record}")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Prints each block to stdout followed by a blank line.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl Sink for ConsoleSink {
    fn record(&mut self, record: &DumpRecord) -> Result<(), OutputError> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{record}")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), OutputError> {
        io::stdout().flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// Writes one JSON object per record, one per line.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn record(&mut self, record: &DumpRecord) -> Result<(), OutputError> {
        let (content, error) = match &record.body {
            RecordBody::Content(c) => (Some(c.as_str()), None),
            RecordBody::Error(e) => (None, Some(e.as_str())),
        };
        let json = JsonRecord {
            path: to_posix(&record.path),
            content,
            error,
        };
        serde_json::to_writer(&mut self.writer, &json)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps records and notices in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<DumpRecord>,
    pub notices: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative paths of all records, in emission order.
    pub fn paths(&self) -> Vec<&Path> {
        self.records.iter().map(|r| r.path.as_path()).collect()
    }

    pub fn find(&self, path: impl AsRef<Path>) -> Option<&DumpRecord> {
        let path = path.as_ref();
        self.records.iter().find(|r| r.path == path)
    }
}

impl Sink for MemorySink {
    fn record(&mut self, record: &DumpRecord) -> Result<(), OutputError> {
        self.records.push(record.clone());
        Ok(())
    }

    fn notice(&mut self, failure: &WalkError) -> Result<(), OutputError> {
        self.notices.push(failure.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_block() {
        let record = DumpRecord::content("a.txt", "hi");
        assert_eq!(record.to_string(), "File: a.txt\n\nContent:\nhi\n\n");
    }

    #[test]
    fn test_error_block() {
        let record = DumpRecord::error("a.txt", "denied");
        assert!(record.is_error());
        assert_eq!(
            record.to_string(),
            "File: a.txt\n\nError reading file a.txt: denied\n\n"
        );
    }

    #[test]
    fn test_writer_sink_concatenates() {
        let mut sink = WriterSink::new(Vec::new());
        sink.record(&DumpRecord::content("a", "1")).unwrap();
        sink.record(&DumpRecord::content("b", "2")).unwrap();
        sink.finish().unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "File: a\n\nContent:\n1\n\nFile: b\n\nContent:\n2\n\n");
    }

    #[test]
    fn test_append_keeps_existing_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("dump.txt");
        std::fs::write(&out, "previous\n").unwrap();

        let mut sink = WriterSink::append(&out).unwrap();
        sink.record(&DumpRecord::content("a", "1")).unwrap();
        sink.finish().unwrap();
        drop(sink);

        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.starts_with("previous\nFile: a"));
    }

    #[test]
    fn test_json_lines() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.record(&DumpRecord::content("dir/a.txt", "hi")).unwrap();
        sink.record(&DumpRecord::error("b.txt", "gone")).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["path"], "dir/a.txt");
        assert_eq!(lines[0]["content"], "hi");
        assert!(lines[0].get("error").is_none());
        assert_eq!(lines[1]["error"], "gone");
    }
}
