use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, MergeError>;

/// Fatal error cases that abort a merge run.
///
/// Per-file read problems are not represented here: they are collected as
/// [`ReadFailure`] values and reported alongside a successful result.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Raised before any file is touched when a user parameter is rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised when the input directory is missing or not a directory.
    #[error("directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// Raised when no file in the directory carries the configured extension.
    #[error("no {extension} files found in {}", directory.display())]
    NoMatchingFiles {
        directory: PathBuf,
        extension: String,
    },

    /// Raised when every discovered file failed to read.
    #[error("no valid data: all {} file(s) failed to read", failures.len())]
    NoValidData { failures: Vec<ReadFailure> },

    /// Raised when the merged table could not be persisted.
    #[error("failed to write {}: {reason}", path.display())]
    WriteFailure { path: PathBuf, reason: String },

    /// Raised when a row-table would violate its shape invariants.
    #[error("invalid table: {0}")]
    InvalidTable(String),

    /// Wrapper for IO failures outside the per-file read boundary.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when the report cannot be serialised.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

/// A recoverable failure to load one source file.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{file}: {reason}")]
pub struct ReadFailure {
    /// File name of the source, as listed in the directory.
    pub file: String,
    /// Full path of the source.
    pub path: PathBuf,
    /// Human readable cause reported by the decoder.
    pub reason: String,
}
