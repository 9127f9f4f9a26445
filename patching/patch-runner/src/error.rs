//! Job errors

use crate::JobState;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error raised by a patching engine outside of individual patches
#[derive(Error, Debug)]
pub enum EngineError {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The base or integration archive could not be read or written
    #[error("Archive error: {0}")]
    Archive(#[from] apk_zip::Error),

    /// Anything else the engine reports
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Create a new Other error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        EngineError::Other(msg.into())
    }
}

/// Why a job stopped
#[derive(Error, Debug)]
pub enum JobError {
    /// Another job is running on this orchestrator
    #[error("Another patch job is already running")]
    Busy,

    /// The integration release has no usable asset
    #[error("Integrations not available: {0}")]
    AssetNotFound(#[source] patch_assets::Error),

    /// Fetching the integrations failed
    #[error("Download failed: {0}")]
    Download(#[source] patch_assets::Error),

    /// The integrations come from a release but no asset cache is configured
    #[error("No asset cache configured for release integrations")]
    NoAssetCache,

    /// The bundle named by the job could not be loaded
    #[error("Bundle load failed: {0}")]
    BundleLoad(#[from] patch_bundle::Error),

    /// None of the selected ids is in the bundle
    #[error("No patches selected")]
    NoPatchesSelected,

    /// The package to patch does not exist
    #[error("Target archive not found: {}", .0.display())]
    TargetNotFound(PathBuf),

    /// The scratch directory could not be created
    #[error("Work directory error: {0}")]
    Workdir(#[source] io::Error),

    /// The patching engine failed outside of a single patch
    #[error("Patching engine error: {0}")]
    Engine(#[from] EngineError),

    /// Merging or aligning failed
    #[error("Repackaging failed: {0}")]
    Repackaging(#[from] apk_zip::Error),

    /// Signing failed
    #[error("Signing failed: {0}")]
    Signing(#[from] apk_sign::Error),

    /// The signed archive could not be moved to the output path
    #[error("Publishing failed: {0}")]
    Publish(#[source] io::Error),

    /// The job was cancelled
    #[error("Job cancelled")]
    Cancelled,
}

impl From<patch_assets::Error> for JobError {
    fn from(err: patch_assets::Error) -> Self {
        match err {
            patch_assets::Error::AssetNotFound { .. } => JobError::AssetNotFound(err),
            other => JobError::Download(other),
        }
    }
}

impl JobError {
    /// Whether the job stopped because it was asked to
    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobError::Cancelled)
    }

    /// Whether running the same job again would fail the same way
    pub fn is_fatal(&self) -> bool {
        match self {
            JobError::Busy | JobError::Cancelled => false,
            JobError::Download(e) => !e.is_transient(),
            _ => true,
        }
    }
}

/// A job error together with the state it happened in
#[derive(Error, Debug)]
#[error("Patch job failed while {state}: {error}")]
pub struct JobFailure {
    /// State the job was in
    pub state: JobState,
    /// What went wrong
    #[source]
    pub error: JobError,
}

impl JobFailure {
    /// Pair an error with its state
    pub fn new<E: Into<JobError>>(state: JobState, error: E) -> Self {
        Self {
            state,
            error: error.into(),
        }
    }
}
