//! Best-effort text decoding for dumped files.
//!
//! Bytes are read whole, an encoding is guessed by an [`EncodingDetector`],
//! and decoding replaces every malformed sequence with U+FFFD. Only I/O
//! failures surface as errors; undecodable content never does.

use std::fs;
use std::path::{Path, PathBuf};

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use thiserror::Error;
use tracing::debug;

/// Single-byte encoding used when the detector has no guess.
pub fn fallback_encoding() -> &'static Encoding {
    WINDOWS_1252
}

/// Errors that can occur while reading a file for the dump.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("{source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReadError {
    /// Path of the file that failed.
    pub fn path(&self) -> &Path {
        match self {
            ReadError::Io { path, .. } => path,
        }
    }
}

/// Guesses the encoding of raw file bytes.
///
/// Any `Fn(&[u8]) -> Option<&'static Encoding>` is a detector, which makes
/// fixed stubs trivial to plug in.
pub trait EncodingDetector {
    /// `None` means no guess; the reader then uses [`fallback_encoding`].
    fn detect(&self, bytes: &[u8]) -> Option<&'static Encoding>;
}

impl<F> EncodingDetector for F
where
    F: Fn(&[u8]) -> Option<&'static Encoding>,
{
    fn detect(&self, bytes: &[u8]) -> Option<&'static Encoding> {
        self(bytes)
    }
}

/// Default detector: BOM sniffing, BOM-less UTF-16 by NUL-byte placement,
/// UTF-8 validation, and a tolerance for mostly-valid UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicDetector;

impl EncodingDetector for HeuristicDetector {
    fn detect(&self, bytes: &[u8]) -> Option<&'static Encoding> {
        if let Some((encoding, _)) = Encoding::for_bom(bytes) {
            return Some(encoding);
        }

        if let Some(encoding) = guess_utf16(bytes) {
            return Some(encoding);
        }

        if std::str::from_utf8(bytes).is_ok() {
            return Some(UTF_8);
        }

        // Mostly well-formed multi-byte text with a few stray bytes.
        let mut multibyte = 0usize;
        let mut invalid = 0usize;
        for chunk in bytes.utf8_chunks() {
            multibyte += chunk.valid().chars().filter(|c| !c.is_ascii()).count();
            if !chunk.invalid().is_empty() {
                invalid += 1;
            }
        }
        if multibyte >= invalid * 4 {
            return Some(UTF_8);
        }

        None
    }
}

fn guess_utf16(bytes: &[u8]) -> Option<&'static Encoding> {
    let pairs = bytes.len() / 2;
    if pairs < 2 {
        return None;
    }

    let mut even_zero = 0usize;
    let mut odd_zero = 0usize;
    for pair in bytes.chunks_exact(2) {
        if pair[0] == 0 && pair[1] != 0 {
            even_zero += 1;
        } else if pair[1] == 0 && pair[0] != 0 {
            odd_zero += 1;
        }
    }

    let threshold = pairs * 2 / 5;
    if odd_zero > threshold && even_zero == 0 {
        Some(UTF_16LE)
    } else if even_zero > threshold && odd_zero == 0 {
        Some(UTF_16BE)
    } else {
        None
    }
}

/// Read `path` as text with the default detector.
pub fn read_text(path: &Path) -> Result<String, ReadError> {
    read_text_with(path, &HeuristicDetector)
}

/// Read `path` as text, guessing its encoding with `detector`.
///
/// The file handle is closed before this returns.
pub fn read_text_with(path: &Path, detector: &dyn EncodingDetector) -> Result<String, ReadError> {
    let bytes = fs::read(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decode_bytes(&bytes, detector))
}

/// Decode bytes with the detector's guess, substituting U+FFFD for
/// malformed sequences.
pub fn decode_bytes(bytes: &[u8], detector: &dyn EncodingDetector) -> String {
    let encoding = detector.detect(bytes).unwrap_or_else(fallback_encoding);
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!(encoding = used.name(), "replaced undecodable bytes");
    }
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn always_utf8(_: &[u8]) -> Option<&'static Encoding> {
        Some(UTF_8)
    }

    fn no_guess(_: &[u8]) -> Option<&'static Encoding> {
        None
    }

    #[test]
    fn test_ascii_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "hello\nworld\n").unwrap();

        assert_eq!(read_text(&path).unwrap(), "hello\nworld\n");
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        let text = decode_bytes(b"ok \xff\xfe done", &always_utf8);
        assert!(text.starts_with("ok "));
        assert!(text.contains('\u{FFFD}'));
        assert!(text.ends_with(" done"));
    }

    #[test]
    fn test_no_guess_falls_back_to_single_byte() {
        let text = decode_bytes(b"caf\xe9", &no_guess);
        assert_eq!(text, "café");
    }

    #[test]
    fn test_detects_bom() {
        let bytes = [0xFF, 0xFE, b'h', 0, b'i', 0];
        assert_eq!(HeuristicDetector.detect(&bytes), Some(UTF_16LE));
        assert_eq!(decode_bytes(&bytes, &HeuristicDetector), "hi");
    }

    #[test]
    fn test_detects_bomless_utf16() {
        let bytes: Vec<u8> = "hello".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        assert_eq!(HeuristicDetector.detect(&bytes), Some(UTF_16LE));

        let bytes: Vec<u8> = "hello".encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
        assert_eq!(HeuristicDetector.detect(&bytes), Some(UTF_16BE));
    }

    #[test]
    fn test_latin1_has_no_guess() {
        assert_eq!(HeuristicDetector.detect(b"caf\xe9 cr\xe8me"), None);
    }

    #[test]
    fn test_mostly_utf8_still_utf8() {
        let mut bytes = "naïve café über straße".as_bytes().to_vec();
        bytes.push(0xFF);
        assert_eq!(HeuristicDetector.detect(&bytes), Some(UTF_8));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.txt");

        let err = read_text(&path).unwrap_err();
        assert_eq!(err.path(), path.as_path());
        assert!(!err.to_string().is_empty());
    }
}
