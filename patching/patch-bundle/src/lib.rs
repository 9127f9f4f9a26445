//! # patch_bundle - Patch bundles and compatibility resolution
//!
//! - [`Patch`] is the capability a patch implements; [`PatchRegistry`] maps
//!   the implementation keys named by a bundle manifest to host code.
//! - [`PatchBundle`] loads a `patches.json` manifest, plain or zipped.
//! - [`resolve`] decides which patches apply to a target package and version.
//! - [`Session`] holds the loaded bundle, the target and the user's selection.
//!
//! ```no_run
//! use patch_bundle::{PatchRegistry, Session, TargetPackage};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), patch_bundle::Error> {
//! let mut session = Session::new(Arc::new(PatchRegistry::new()));
//! session.load_bundle(Path::new("patches.json"))?;
//! session.set_target(TargetPackage::new("com.example.app", "1.0"));
//! let resolved = session.resolve();
//! session.select_all(&resolved, true);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod descriptor;
pub mod error;
pub mod loader;
pub mod patch;
pub mod registry;
pub mod resolver;
pub mod session;

pub use descriptor::{CompatiblePackage, OptionValues, PatchDescriptor, PatchOption};
pub use error::{Error, PatchError, Result};
pub use loader::{LoadedPatch, MANIFEST_NAME, Manifest, ManifestEntry, PatchBundle, load};
pub use patch::{Patch, PatchContext};
pub use registry::{PatchFactory, PatchRegistry};
pub use resolver::{ResolvedPatch, dedup_by_id, resolve, resolve_descriptors};
pub use session::{Session, TargetPackage};
