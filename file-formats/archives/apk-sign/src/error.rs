//! Error types for signing

use std::io;
use thiserror::Error;

/// Result type alias for signing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for signing operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input could not be read as a zip archive
    #[error("Archive error: {0}")]
    Archive(#[from] apk_zip::Error),

    /// Key generation, encoding or decoding failed
    #[error("Key error: {0}")]
    Key(String),

    /// Certificate encoding or decoding failed
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Producing the signature failed
    #[error("Signature error: {0}")]
    Signature(String),

    /// A signed archive did not verify
    #[error("Verification failed: {0}")]
    Verification(String),
}

impl Error {
    /// Create a new Key error
    pub fn key<S: Into<String>>(msg: S) -> Self {
        Error::Key(msg.into())
    }

    /// Create a new Certificate error
    pub fn certificate<S: Into<String>>(msg: S) -> Self {
        Error::Certificate(msg.into())
    }

    /// Create a new Signature error
    pub fn signature<S: Into<String>>(msg: S) -> Self {
        Error::Signature(msg.into())
    }

    /// Create a new Verification error
    pub fn verification<S: Into<String>>(msg: S) -> Self {
        Error::Verification(msg.into())
    }

    /// Check if the error means a signed archive was tampered with or malformed
    pub fn is_verification_failure(&self) -> bool {
        matches!(self, Error::Verification(_))
    }
}

impl From<rsa::Error> for Error {
    fn from(err: rsa::Error) -> Self {
        Error::Signature(err.to_string())
    }
}
