//! Error types for sift.

use std::path::PathBuf;

use crate::sink::OutputError;

/// Top-level error type for sift operations.
///
/// Missing directories, unreadable files and denied listings are not errors
/// at this level; they are reported inline and the operation completes.
#[derive(Debug, thiserror::Error)]
pub enum SiftError {
    #[error("cannot resolve root {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

/// Map an error to its exit code.
pub fn exit_code(error: &SiftError) -> i32 {
    match error {
        SiftError::Root { .. } => 2,
        SiftError::Io(_) => 1,
        SiftError::Output(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let root = SiftError::Root {
            path: PathBuf::from("x"),
            source: std::io::Error::other("gone"),
        };
        assert_eq!(exit_code(&root), 2);

        let output = SiftError::from(OutputError::Io(std::io::Error::other("full")));
        assert_eq!(exit_code(&output), 1);
        assert!(output.to_string().contains("full"));
    }
}
