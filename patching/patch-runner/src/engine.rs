//! The seam between the orchestrator and whatever rewrites the package

use crate::EngineError;
use apk_zip::CodeUnit;
use patch_bundle::{LoadedPatch, OptionValues, PatchError};
use std::path::{Path, PathBuf};

/// Builds one engine per job
pub trait EngineFactory: Send + Sync {
    /// Open `base` for patching; `cache_dir` is scratch space owned by the job
    fn create(&self, base: &Path, cache_dir: &Path) -> Result<Box<dyn PatchingEngine>, EngineError>;
}

/// Applies patches to one package
pub trait PatchingEngine {
    /// Add the code units of an integration archive, returning how many
    fn merge_integrations(&mut self, archive: &Path) -> Result<usize, EngineError>;

    /// Apply one patch
    ///
    /// A failing patch must leave no partial edits behind.
    fn apply(&mut self, patch: &LoadedPatch, options: &OptionValues) -> Result<(), PatchError>;

    /// Finish patching and hand over the results
    fn save(self: Box<Self>) -> Result<EngineOutput, EngineError>;
}

/// What an engine produces
#[derive(Debug, Clone)]
pub struct EngineOutput {
    /// Code units to write over the resource archive
    pub code_units: Vec<CodeUnit>,
    /// Archive carrying every resource-level edit
    pub resource_archive: PathBuf,
}
