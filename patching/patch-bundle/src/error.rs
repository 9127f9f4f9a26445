//! Error types for bundle loading and patch application

use std::io;
use thiserror::Error;

/// Result type alias for bundle operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading a bundle or editing session state
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The bundle is a zip container that could not be read
    #[error("Bundle archive error: {0}")]
    Archive(#[from] apk_zip::Error),

    /// The manifest is not valid JSON or does not match the schema
    #[error("Invalid bundle manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    /// A zip bundle without a manifest entry
    #[error("Bundle has no {0} entry")]
    MissingManifest(String),

    /// Two manifest entries share an id
    #[error("Duplicate patch id in bundle: {0}")]
    DuplicatePatch(String),

    /// A manifest entry names an implementation the registry does not know
    #[error("Patch {id} uses unknown implementation '{implementation}'")]
    UnknownImplementation {
        /// Patch id
        id: String,
        /// Registry key from the manifest
        implementation: String,
    },

    /// A manifest entry that is well-formed JSON but not a usable descriptor
    #[error("Invalid descriptor for patch '{id}': {reason}")]
    InvalidDescriptor {
        /// Patch id
        id: String,
        /// What is wrong with it
        reason: String,
    },

    /// Option set for a patch that does not declare it
    #[error("Patch {id} has no option '{key}'")]
    UnknownOption {
        /// Patch id
        id: String,
        /// Option key
        key: String,
    },

    /// Option set for a patch that is not in the loaded bundle
    #[error("Patch {0} is not in the loaded bundle")]
    UnknownPatch(String),
}

impl Error {
    /// Create a new InvalidDescriptor error
    pub fn invalid_descriptor<I: Into<String>, R: Into<String>>(id: I, reason: R) -> Self {
        Error::InvalidDescriptor {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error came from reading or validating a bundle
    pub fn is_bundle_load(&self) -> bool {
        !matches!(self, Error::UnknownOption { .. } | Error::UnknownPatch(_))
    }
}

/// Failure of a single patch, recorded in the job outcome instead of aborting
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The patch ran and reported a failure
    #[error("{0}")]
    Failed(String),

    /// A code unit the patch needs is absent
    #[error("Code unit not found: {0}")]
    MissingCodeUnit(String),

    /// A resource the patch needs is absent
    #[error("Resource not found: {0}")]
    MissingResource(String),

    /// A required option has no value, or a value is unusable
    #[error("Option '{key}': {message}")]
    InvalidOption {
        /// Option key
        key: String,
        /// What is wrong
        message: String,
    },

    /// The engine could not give the patch access to the package
    #[error("Engine error: {0}")]
    Engine(String),
}

impl PatchError {
    /// Create a new Failed error
    pub fn failed<S: Into<String>>(msg: S) -> Self {
        PatchError::Failed(msg.into())
    }
}
