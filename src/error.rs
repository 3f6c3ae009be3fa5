//! Error types for comic-integrity
//!
//! Damaged files are never reported through these types: validation and
//! recovery always return populated result values. `Error` is used on the
//! internal step boundaries (one validator step, one executor) and for
//! genuine usage errors such as an invalid configuration or an unreadable
//! checksum manifest.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for comic-integrity operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for comic-integrity
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "hash_chunk_size")
        key: Option<String>,
    },

    /// Container-level failure (open, entry read, repackaging)
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A blocking task panicked or was cancelled
    #[error("background task failed: {0}")]
    Task(String),

    /// Operation not supported for this container or input
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Container-level errors raised by the archive readers and writers
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The container (or its entry table) could not be opened
    #[error("failed to open {archive}: {reason}")]
    OpenFailed {
        /// The container that could not be opened
        archive: PathBuf,
        /// The reason reported by the underlying reader
        reason: String,
    },

    /// A single entry could not be read
    #[error("failed to read entry {entry} in {archive}: {reason}")]
    EntryUnreadable {
        /// The container holding the entry
        archive: PathBuf,
        /// The entry name
        entry: String,
        /// The reason reported by the underlying reader
        reason: String,
    },

    /// The entry data does not match its stored CRC32
    #[error("checksum mismatch for entry {entry} in {archive}: stored {expected:08x}, computed {actual:08x}")]
    ChecksumMismatch {
        /// The container holding the entry
        archive: PathBuf,
        /// The entry name
        entry: String,
        /// CRC32 declared by the container
        expected: u32,
        /// CRC32 computed over the entry data
        actual: u32,
    },

    /// The container format has no reader for the requested operation
    #[error("unsupported container format {format} for {archive}")]
    UnsupportedFormat {
        /// The container
        archive: PathBuf,
        /// Human-readable format name
        format: String,
    },

    /// Writing a fresh container failed
    #[error("failed to write container {archive}: {reason}")]
    WriteFailed {
        /// The container being written
        archive: PathBuf,
        /// The reason writing failed
        reason: String,
    },
}

impl Error {
    /// Build a configuration error for a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Task(e.to_string())
    }
}
