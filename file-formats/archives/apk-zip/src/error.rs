//! Error types for the zip codec

use std::io;
use thiserror::Error;

/// Result type alias for archive operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for archive operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid zip structure or corrupted archive
    #[error("Invalid zip format: {0}")]
    InvalidFormat(String),

    /// Archive uses a zip feature this codec does not implement
    #[error("Unsupported zip feature: {0}")]
    Unsupported(String),

    /// Entry not found in archive
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Two entries with the same name were written to one archive
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Compression/decompression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// Stored CRC does not match the extracted data
    #[error("Checksum mismatch for {entry}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Entry name
        entry: String,
        /// CRC-32 recorded in the central directory
        expected: u32,
        /// CRC-32 of the extracted data
        actual: u32,
    },
}

impl Error {
    /// Create a new InvalidFormat error
    pub fn invalid_format<S: Into<String>>(msg: S) -> Self {
        Error::InvalidFormat(msg.into())
    }

    /// Create a new Unsupported error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create a new Compression error
    pub fn compression<S: Into<String>>(msg: S) -> Self {
        Error::Compression(msg.into())
    }

    /// Check if this error indicates the archive is corrupted
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::InvalidFormat(_) | Error::ChecksumMismatch { .. } | Error::Compression(_)
        )
    }
}
