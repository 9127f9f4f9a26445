//! The patch job pipeline
//!
//! A job moves through the states of [`JobState`] in order:
//!
//! 1. Load the bundle named by the job, or keep the session's bundle
//! 2. Map selected ids to patches and locate the integration archive
//! 3. Create a scratch directory
//! 4. Apply patches; a failing patch is recorded and skipped
//! 5. Collect code units and the resource archive from the engine
//! 6. Merge and align
//! 7. Sign and publish the output atomically
//!
//! Any other failure, or cancellation, ends the job. The scratch directory is
//! removed on every path.

use crate::engine::EngineFactory;
use crate::job::{IntegrationSource, JobReport, PatchJob, PatchOutcome};
use crate::observer::{CancelToken, JobObserver};
use crate::workdir::WorkDir;
use crate::{JobError, JobFailure, JobState};
use apk_sign::SigningIdentity;
use patch_assets::AssetCache;
use patch_bundle::{LoadedPatch, OptionValues, PatchError, Session};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

type JobResult<T> = std::result::Result<T, JobError>;

/// Runs patch jobs, one at a time
pub struct Orchestrator {
    engines: Arc<dyn EngineFactory>,
    identity: Arc<SigningIdentity>,
    assets: Option<Arc<AssetCache>>,
    busy: AtomicBool,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("assets", &self.assets)
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Orchestrator patching with `engines` and signing with `identity`
    pub fn new(engines: Arc<dyn EngineFactory>, identity: Arc<SigningIdentity>) -> Self {
        Self {
            engines,
            identity,
            assets: None,
            busy: AtomicBool::new(false),
        }
    }

    /// Fetch release integrations through `cache`
    pub fn with_asset_cache(mut self, cache: Arc<AssetCache>) -> Self {
        self.assets = Some(cache);
        self
    }

    /// Whether a job is running
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Run `job` against `session`
    ///
    /// Fails with [`JobError::Busy`] while another job runs on this
    /// orchestrator.
    pub fn run(
        &self,
        job: &PatchJob,
        session: &Session,
        observer: &dyn JobObserver,
        cancel: &CancelToken,
    ) -> Result<JobReport, JobFailure> {
        let _busy = self
            .acquire()
            .ok_or_else(|| JobFailure::new(JobState::Idle, JobError::Busy))?;

        log::info!(
            "Starting patch job: {} -> {} ({} patches selected)",
            job.target.display(),
            job.output.display(),
            job.selected.len()
        );

        let mut progress = Progress {
            state: JobState::Idle,
            observer,
            cancel,
        };

        match self.pipeline(job, session, &mut progress) {
            Ok(report) => {
                observer.state_changed(JobState::Done);
                log::info!(
                    "Patch job complete: {}/{} patches applied, output {}",
                    report.succeeded(),
                    report.outcomes.len(),
                    report.output.display()
                );
                Ok(report)
            }
            Err(error) => {
                let failure = JobFailure::new(progress.state, error);
                observer.state_changed(JobState::Failed);
                log::error!("{}", failure);
                Err(failure)
            }
        }
    }

    fn pipeline(
        &self,
        job: &PatchJob,
        session: &Session,
        progress: &mut Progress<'_>,
    ) -> JobResult<JobReport> {
        progress.enter(JobState::LoadingBundle)?;
        let bundle = match &job.bundle {
            Some(path) => session.load_bundle(path)?,
            None => session.bundle(),
        };

        progress.enter(JobState::Resolving)?;
        let patches = bundle.find_by_ids(job.selected.iter().map(String::as_str));
        if patches.is_empty() {
            return Err(JobError::NoPatchesSelected);
        }
        for id in &job.selected {
            if bundle.get(id).is_none() {
                log::warn!("Selected patch {} is not in the bundle", id);
            }
        }
        let planned: Vec<(LoadedPatch, Result<OptionValues, PatchError>)> = patches
            .into_iter()
            .map(|patch| {
                let user = session.options_for(&patch.descriptor.id);
                let options = OptionValues::effective(&patch.descriptor, user);
                (patch, options)
            })
            .collect();
        if !job.target.is_file() {
            return Err(JobError::TargetNotFound(job.target.clone()));
        }
        let integrations = self.resolve_integrations(&job.integrations)?;

        progress.enter(JobState::PreparingWorkdir)?;
        let workdir = WorkDir::create(&job.work_root, job.extension()).map_err(JobError::Workdir)?;

        progress.enter(JobState::Applying)?;
        let mut engine = self.engines.create(&job.target, &workdir.cache_dir())?;
        if let Some(path) = &integrations {
            let merged = engine.merge_integrations(path)?;
            log::info!("Merged {} code units from {}", merged, path.display());
        }

        let mut outcomes = Vec::with_capacity(planned.len());
        for (index, (patch, options)) in planned.iter().enumerate() {
            progress.check()?;
            let id = &patch.descriptor.id;
            log::debug!("Applying {} ({}/{})", id, index + 1, planned.len());

            let result = options
                .clone()
                .and_then(|options| engine.apply(patch, &options));
            let outcome = match result {
                Ok(()) => {
                    log::info!("[success] {}", id);
                    PatchOutcome::success(id.as_str())
                }
                Err(e) => {
                    log::warn!("[error] {}: {}", id, e);
                    PatchOutcome::failure(id.as_str(), e)
                }
            };
            progress.observer.patch_finished(&outcome);
            outcomes.push(outcome);
        }

        progress.enter(JobState::Saving)?;
        let output = engine.save()?;
        log::debug!(
            "Engine produced {} code units and {}",
            output.code_units.len(),
            output.resource_archive.display()
        );

        progress.enter(JobState::Repackaging)?;
        let merge = apk_zip::merge(
            &output.code_units,
            &output.resource_archive,
            &workdir.patched(),
        )?;
        let align = apk_zip::align(&workdir.patched(), &workdir.aligned())?;

        progress.enter(JobState::Signing)?;
        apk_sign::sign(&workdir.aligned(), &workdir.signed(), &self.identity)?;
        progress.check()?;
        publish(&workdir.signed(), &job.output).map_err(JobError::Publish)?;

        if let Err(e) = workdir.close() {
            log::warn!("Failed to remove work directory: {}", e);
        }

        Ok(JobReport {
            outcomes,
            output: job.output.clone(),
            integrations,
            merge,
            align,
        })
    }

    fn resolve_integrations(&self, source: &IntegrationSource) -> JobResult<Option<PathBuf>> {
        match source {
            IntegrationSource::None => Ok(None),
            IntegrationSource::File(path) => Ok(Some(path.clone())),
            IntegrationSource::Release(source) => {
                let cache = self.assets.as_ref().ok_or(JobError::NoAssetCache)?;
                let artifact = cache.fetch_latest(source)?;
                log::info!(
                    "Using integrations {} {} ({})",
                    artifact.tag,
                    artifact.asset,
                    if artifact.cache_hit { "cached" } else { "downloaded" }
                );
                Ok(Some(artifact.path))
            }
        }
    }

    fn acquire(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BusyGuard(&self.busy))
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct Progress<'a> {
    state: JobState,
    observer: &'a dyn JobObserver,
    cancel: &'a CancelToken,
}

impl Progress<'_> {
    fn enter(&mut self, state: JobState) -> JobResult<()> {
        self.check()?;
        log::debug!("Phase: {}", state);
        self.state = state;
        self.observer.state_changed(state);
        Ok(())
    }

    fn check(&self) -> JobResult<()> {
        if self.cancel.is_cancelled() {
            log::info!("Cancelled while {}", self.state);
            return Err(JobError::Cancelled);
        }
        Ok(())
    }
}

/// Copy `signed` to `output` through a temporary file in the same directory
fn publish(signed: &Path, output: &Path) -> io::Result<()> {
    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut staging = tempfile::Builder::new()
        .prefix(".publish-")
        .tempfile_in(parent)?;
    io::copy(&mut File::open(signed)?, staging.as_file_mut())?;
    staging.as_file().sync_all()?;
    staging.persist(output).map_err(|e| e.error)?;
    log::info!("Published {}", output.display());
    Ok(())
}
