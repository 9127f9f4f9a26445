//! # patch_runner - Patch job orchestration
//!
//! Takes a package, the patches a user selected and an optional integration
//! archive through the whole pipeline: apply, merge, align, sign, publish.
//!
//! - [`Orchestrator`] runs one [`PatchJob`] at a time and reports a
//!   [`JobReport`] or a [`JobFailure`] naming the [`JobState`] it stopped in.
//! - [`EngineFactory`] and [`PatchingEngine`] are the seam to the code that
//!   rewrites the package; [`OverlayEngine`] is the in-tree implementation.
//! - [`JobObserver`] and [`CancelToken`] let a front end follow and stop a job.
//!
//! ```no_run
//! use apk_sign::KeyStore;
//! use patch_bundle::{PatchRegistry, Session};
//! use patch_runner::{CancelToken, Orchestrator, OverlayEngineFactory, PatchJob};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let identity = KeyStore::load_or_create(Path::new("keys"), "Patchwright")?;
//! let orchestrator = Orchestrator::new(Arc::new(OverlayEngineFactory), Arc::new(identity));
//! let session = Session::new(Arc::new(PatchRegistry::new()));
//!
//! let job = PatchJob::new("app.apk", "app-patched.apk")
//!     .with_bundle("patches.json")
//!     .with_patches(["remove-ads"]);
//! let report = orchestrator.run(&job, &session, &(), &CancelToken::new())?;
//! println!("{} patches applied", report.succeeded());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod engine;
pub mod error;
pub mod job;
pub mod observer;
pub mod orchestrator;
pub mod overlay;
pub mod state;
pub mod workdir;

pub use engine::{EngineFactory, EngineOutput, PatchingEngine};
pub use error::{EngineError, JobError, JobFailure};
pub use job::{IntegrationSource, JobReport, PatchJob, PatchOutcome};
pub use observer::{CancelToken, JobObserver};
pub use orchestrator::Orchestrator;
pub use overlay::{OverlayEngine, OverlayEngineFactory, is_code_unit};
pub use state::JobState;
pub use workdir::WorkDir;
