//! Centralized error types for mailextract.
//!
//! Three layers, matching how far an error is allowed to travel:
//!
//! - [`ExtractError`] aborts a whole run (archive unusable, output root
//!   uncreatable).
//! - [`SourceError`] and [`WriteError`] are scoped to one message or one
//!   folder; the exporter records them in the report and moves on.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors: the run stops and no report is produced.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The archive file does not exist.
    #[error("Archive not found: {0}")]
    ArchiveNotFound(PathBuf),

    /// The file failed the container signature check.
    #[error("Not a recognized archive: {0}")]
    UnrecognizedArchive(PathBuf),

    /// A known container format that no built-in reader handles.
    #[error("'{path}' is a {format} file, which has no built-in reader; implement `archive::Archive` for it")]
    UnsupportedArchive { path: PathBuf, format: &'static str },

    /// The signature matched but the container header is unusable.
    #[error("Corrupt archive header in '{path}': {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    /// The output root could not be created.
    #[error("Cannot create output directory '{path}': {source}")]
    OutputRoot {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, ExtractError>`.
pub type Result<T> = std::result::Result<T, ExtractError>;

impl ExtractError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A record or folder listing could not be read from the archive.
#[derive(Error, Debug)]
pub enum SourceError {
    /// I/O error while reading from the archive.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The record exists but its contents are unusable.
    #[error("Unreadable record {id}: {reason}")]
    Record { id: String, reason: String },
}

impl SourceError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Writing one message's output files failed.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Filesystem error on a specific output path.
    #[error("Cannot write '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The message container could not be serialized.
    #[error("Cannot build message file: {0}")]
    Eml(String),

    /// The PDF document could not be produced.
    #[error("Cannot build PDF document: {0}")]
    Pdf(String),
}

impl WriteError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<lopdf::Error> for WriteError {
    fn from(e: lopdf::Error) -> Self {
        Self::Pdf(e.to_string())
    }
}
