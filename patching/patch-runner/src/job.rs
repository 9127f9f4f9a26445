//! What a job is asked to do and what it reports back

use apk_zip::{AlignSummary, MergeSummary};
use patch_assets::SourceId;
use patch_bundle::PatchError;
use std::path::{Path, PathBuf};

/// Where the integration archive comes from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IntegrationSource {
    /// Patch without integrations
    #[default]
    None,
    /// A local archive
    File(PathBuf),
    /// The latest release of a repository, through the asset cache
    Release(SourceId),
}

/// One patching run
#[derive(Debug, Clone)]
pub struct PatchJob {
    /// Package to patch
    pub target: PathBuf,
    /// Where the signed package is published
    pub output: PathBuf,
    /// Integration archive to merge before patching
    pub integrations: IntegrationSource,
    /// Ids of the patches to apply
    pub selected: Vec<String>,
    /// Bundle to load first; the session's current bundle when `None`
    pub bundle: Option<PathBuf>,
    /// Directory scratch directories are created in
    pub work_root: PathBuf,
}

impl PatchJob {
    /// A job patching `target` into `output`
    ///
    /// Scratch directories go to the system temporary directory.
    pub fn new<T: Into<PathBuf>, O: Into<PathBuf>>(target: T, output: O) -> Self {
        Self {
            target: target.into(),
            output: output.into(),
            integrations: IntegrationSource::None,
            selected: Vec::new(),
            bundle: None,
            work_root: std::env::temp_dir(),
        }
    }

    /// Set the patches to apply
    pub fn with_patches<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Set the integration source
    pub fn with_integrations(mut self, integrations: IntegrationSource) -> Self {
        self.integrations = integrations;
        self
    }

    /// Load this bundle before resolving
    pub fn with_bundle<P: Into<PathBuf>>(mut self, bundle: P) -> Self {
        self.bundle = Some(bundle.into());
        self
    }

    /// Create scratch directories under `root`
    pub fn with_work_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.work_root = root.into();
        self
    }

    /// Extension used for scratch files, from the target's name
    pub fn extension(&self) -> &str {
        self.target
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .unwrap_or("apk")
    }
}

/// Result of applying one patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    /// Patch id
    pub id: String,
    /// Why the patch failed; `None` on success
    pub error: Option<PatchError>,
}

impl PatchOutcome {
    /// A successful outcome
    pub fn success<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            error: None,
        }
    }

    /// A failed outcome
    pub fn failure<S: Into<String>>(id: S, error: PatchError) -> Self {
        Self {
            id: id.into(),
            error: Some(error),
        }
    }

    /// Whether the patch applied
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// What a finished job produced
#[derive(Debug, Clone)]
pub struct JobReport {
    /// One outcome per applied patch, in application order
    pub outcomes: Vec<PatchOutcome>,
    /// Published package
    pub output: PathBuf,
    /// Integration archive that was merged, if any
    pub integrations: Option<PathBuf>,
    /// Merge statistics
    pub merge: MergeSummary,
    /// Alignment statistics
    pub align: AlignSummary,
}

impl JobReport {
    /// Published package
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Number of patches that applied
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Outcomes of patches that failed
    pub fn failures(&self) -> impl Iterator<Item = &PatchOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}
