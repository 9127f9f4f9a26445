//! Watching and stopping a running job

use crate::{JobState, PatchOutcome};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Receives progress of a job
///
/// Called on the thread running the job. Both methods do nothing by default.
pub trait JobObserver: Send + Sync {
    /// The job entered `state`
    fn state_changed(&self, _state: JobState) {}

    /// A patch finished
    fn patch_finished(&self, _outcome: &PatchOutcome) {}
}

/// Observer that ignores everything
impl JobObserver for () {}

/// Shared flag asking a job to stop
///
/// Clones refer to the same flag. The job checks it before each state and
/// before publishing.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the job to stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
