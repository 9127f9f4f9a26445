//! Error types for asset acquisition

use std::io;
use thiserror::Error;

/// Result type alias for asset operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for asset operations
#[derive(Error, Debug)]
pub enum Error {
    /// The release has no asset that looks like an installable binary
    #[error("No usable asset in release {tag}")]
    AssetNotFound {
        /// Release tag that was searched
        tag: String,
    },

    /// A request to the remote repository failed
    #[error("Download of {url} failed: {message}")]
    Download {
        /// Requested URL
        url: String,
        /// HTTP status, when the server answered
        status: Option<u16>,
        /// Transport or server message
        message: String,
    },

    /// Source identifier is not of the form `owner/repo`
    #[error("Invalid source '{0}': expected owner/repo")]
    InvalidSource(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a new Download error
    pub fn download<U: Into<String>, M: Into<String>>(
        url: U,
        status: Option<u16>,
        message: M,
    ) -> Self {
        Error::Download {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    /// Check if retrying the same request later might succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Download { status: None, .. } => true,
            Error::Download {
                status: Some(status),
                ..
            } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
