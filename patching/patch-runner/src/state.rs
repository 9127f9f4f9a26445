//! Job states

use std::fmt;

/// Where a job is in the pipeline
///
/// States advance in declaration order from `Idle` to `Done`. `Failed` can
/// follow any state after `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobState {
    /// No job is running
    Idle,
    /// Loading the bundle named by the job
    LoadingBundle,
    /// Mapping selected ids to patches and locating integrations
    Resolving,
    /// Creating the scratch directory
    PreparingWorkdir,
    /// Running patches through the engine
    Applying,
    /// Collecting the engine's output
    Saving,
    /// Merging and aligning the archive
    Repackaging,
    /// Signing and publishing
    Signing,
    /// Finished; the output is published
    Done,
    /// Stopped by an error or cancellation
    Failed,
}

impl JobState {
    /// Whether no further transition follows
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    /// Label used in logs and the CLI
    pub fn label(self) -> &'static str {
        match self {
            JobState::Idle => "idle",
            JobState::LoadingBundle => "loading bundle",
            JobState::Resolving => "resolving patches",
            JobState::PreparingWorkdir => "preparing work directory",
            JobState::Applying => "applying patches",
            JobState::Saving => "saving",
            JobState::Repackaging => "repackaging",
            JobState::Signing => "signing",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
