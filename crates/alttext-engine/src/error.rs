//! Error types shared by the scanner, the patcher and the work-queue loader.
//!
//! `EngineError` covers failures that abort an operation (a file that cannot be
//! scanned, a queue that cannot be loaded). `PatchError` covers per-record
//! failures that the patcher recovers from locally and reports.
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid work queue {}: {source}", path.display())]
    Queue {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not find asset '{asset}' in {document}")]
    Locate { document: String, asset: String },

    #[error("line_number must be positive, got {0}")]
    InvalidLine(i64),

    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("line {line} out of range ({line_count} lines)")]
    OutOfRange { line: usize, line_count: usize },

    #[error("asset not found")]
    NoMatch,

    #[error("html parser rejected the content as non-html")]
    Rejected,

    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("io error: {0}")]
    Io(String),
}
