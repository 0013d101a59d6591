//! Error types for the rcarve-core library.
//!
//! Every failure a carve run can hit is a variant of [`Error`]. Variants are
//! grouped into the coarse classes of [`ErrorKind`] so front ends can decide
//! how to present them without matching on every case.

use crate::carver::CarveSummary;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rcarve operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all rcarve operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The caller selected no file types at all
    #[error("no file types selected")]
    NoTypesSelected,

    /// A selected type tag is not present in the registry
    #[error("unknown file type '{tag}' (known: {known})")]
    UnknownType {
        /// The tag that failed to resolve
        tag: String,
        /// Comma separated list of tags the registry does know
        known: String,
    },

    /// A signature violates the registry invariants
    #[error("invalid signature '{tag}': {reason}")]
    InvalidSignature {
        /// Tag of the offending signature
        tag: String,
        /// What is wrong with it
        reason: String,
    },

    /// Carver configuration is unusable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to create output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to open the input source
    #[error("failed to open '{path}': {source}")]
    FileOpen {
        /// Path to the source that failed to open
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Reading the input stream failed mid-run
    #[error("failed to read input at offset {offset}: {source}")]
    InputRead {
        /// Absolute stream offset of the failed read
        offset: u64,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a carved artifact
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled between two chunk reads
    #[error("carve cancelled")]
    Cancelled,
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Pre-flight failure, nothing was read or written
    Configuration,
    /// The input stream failed mid-run
    InputRead,
    /// An artifact could not be written
    OutputWrite,
    /// The caller asked the run to stop
    Cancelled,
}

impl Error {
    /// Creates a new unknown type error
    pub fn unknown_type<'a>(
        tag: impl Into<String>,
        known: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self::UnknownType {
            tag: tag.into(),
            known: known.into_iter().collect::<Vec<_>>().join(", "),
        }
    }

    /// Creates a new invalid signature error
    pub fn invalid_signature(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSignature {
            tag: tag.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new source open error
    pub fn file_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileOpen {
            path: path.into(),
            source,
        }
    }

    /// Creates a new input read error
    pub fn input_read(offset: u64, source: std::io::Error) -> Self {
        Self::InputRead { offset, source }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Returns the class this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoTypesSelected
            | Self::UnknownType { .. }
            | Self::InvalidSignature { .. }
            | Self::InvalidConfig(_)
            | Self::DirectoryCreate { .. }
            | Self::FileOpen { .. } => ErrorKind::Configuration,
            Self::InputRead { .. } => ErrorKind::InputRead,
            Self::FileWrite { .. } => ErrorKind::OutputWrite,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Returns true if the error was raised before any input was consumed
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

/// A fatal carve error together with what was recovered before it happened.
///
/// Artifacts already written stay on disk; `summary` tells how many.
#[derive(Error, Debug)]
#[error("{error} ({} files written, {} bytes scanned)", .summary.files_written, .summary.bytes_scanned)]
pub struct CarveFailure {
    /// Progress made before the failure
    pub summary: CarveSummary,
    /// The error that ended the run
    #[source]
    pub error: Error,
}

impl CarveFailure {
    /// Wraps an error with the partial summary of the run
    pub fn new(summary: CarveSummary, error: Error) -> Self {
        Self { summary, error }
    }

    /// Wraps an error raised before the run started
    pub fn preflight(error: Error) -> Self {
        Self::new(CarveSummary::default(), error)
    }

    /// Returns the class of the underlying error
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}
