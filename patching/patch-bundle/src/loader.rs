//! Bundle manifests and loading them against a registry
//!
//! A bundle is a `patches.json` manifest, either as a plain file or as an
//! entry of a zip container:
//!
//! ```json
//! {
//!   "patches": [
//!     {
//!       "id": "remove-ads",
//!       "name": "Remove ads",
//!       "implementation": "ads.remove",
//!       "compatiblePackages": [
//!         { "packageName": "com.example.app", "allowedVersions": ["1.0", "1.1"] }
//!       ]
//!     }
//!   ]
//! }
//! ```

use crate::{Error, Patch, PatchDescriptor, PatchRegistry, Result};
use apk_zip::ZipArchive;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Manifest entry name inside a zip bundle
pub const MANIFEST_NAME: &str = "patches.json";

/// Bundle manifest document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Patches in bundle order
    pub patches: Vec<ManifestEntry>,
}

/// One patch of a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Descriptor fields
    #[serde(flatten)]
    pub descriptor: PatchDescriptor,
    /// Registry key of the implementation
    pub implementation: String,
}

/// A descriptor paired with the code that implements it
#[derive(Clone)]
pub struct LoadedPatch {
    /// Metadata
    pub descriptor: PatchDescriptor,
    /// Implementation from the registry
    pub implementation: Arc<dyn Patch>,
}

impl fmt::Debug for LoadedPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPatch")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// The set of patches loaded from one bundle
#[derive(Debug, Clone, Default)]
pub struct PatchBundle {
    source: Option<PathBuf>,
    patches: Vec<LoadedPatch>,
}

impl PatchBundle {
    /// A bundle with no patches
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a bundle file, plain JSON or zipped
    pub fn load(path: &Path, registry: &PatchRegistry) -> Result<Self> {
        log::info!("Loading patch bundle {}", path.display());
        let bytes = std::fs::read(path)?;
        let mut bundle = Self::from_bytes(&bytes, registry)?;
        bundle.source = Some(path.to_path_buf());
        Ok(bundle)
    }

    /// Load a bundle from memory
    pub fn from_bytes(bytes: &[u8], registry: &PatchRegistry) -> Result<Self> {
        let manifest = if apk_zip::is_zip(bytes) {
            log::debug!("Bundle is a zip container");
            let mut archive = ZipArchive::new(Cursor::new(bytes))?;
            let entry = archive
                .entry(MANIFEST_NAME)
                .cloned()
                .ok_or_else(|| Error::MissingManifest(MANIFEST_NAME.to_string()))?;
            archive.read_entry(&entry)?
        } else {
            bytes.to_vec()
        };

        let manifest: Manifest = serde_json::from_slice(&manifest)?;
        Self::from_manifest(manifest, registry)
    }

    /// Resolve a parsed manifest against a registry
    pub fn from_manifest(manifest: Manifest, registry: &PatchRegistry) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut patches = Vec::with_capacity(manifest.patches.len());

        for entry in manifest.patches {
            let descriptor = entry.descriptor;
            validate(&descriptor)?;
            if !seen.insert(descriptor.id.clone()) {
                return Err(Error::DuplicatePatch(descriptor.id));
            }

            let implementation = registry.create(&entry.implementation).ok_or_else(|| {
                Error::UnknownImplementation {
                    id: descriptor.id.clone(),
                    implementation: entry.implementation.clone(),
                }
            })?;
            log::trace!("Loaded patch {} ({})", descriptor.id, entry.implementation);
            patches.push(LoadedPatch {
                descriptor,
                implementation,
            });
        }

        log::debug!("Bundle holds {} patches", patches.len());
        Ok(Self {
            source: None,
            patches,
        })
    }

    /// File the bundle was loaded from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Patches in bundle order
    pub fn patches(&self) -> &[LoadedPatch] {
        &self.patches
    }

    /// Descriptors in bundle order
    pub fn descriptors(&self) -> impl Iterator<Item = &PatchDescriptor> {
        self.patches.iter().map(|p| &p.descriptor)
    }

    /// Look up a patch by id
    pub fn get(&self, id: &str) -> Option<&LoadedPatch> {
        self.patches.iter().find(|p| p.descriptor.id == id)
    }

    /// Patches whose ids are in `ids`, in bundle order
    pub fn find_by_ids<'a, I>(&self, ids: I) -> Vec<LoadedPatch>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let wanted: HashSet<&str> = ids.into_iter().collect();
        self.patches
            .iter()
            .filter(|p| wanted.contains(p.descriptor.id.as_str()))
            .cloned()
            .collect()
    }

    /// Number of patches
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Whether the bundle has no patches
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

fn validate(descriptor: &PatchDescriptor) -> Result<()> {
    if descriptor.id.trim().is_empty() {
        return Err(Error::invalid_descriptor(&descriptor.name, "empty id"));
    }
    if let Some(options) = &descriptor.options {
        let mut keys = HashSet::new();
        for option in options {
            if !keys.insert(option.key.as_str()) {
                return Err(Error::invalid_descriptor(
                    &descriptor.id,
                    format!("option '{}' declared twice", option.key),
                ));
            }
        }
    }
    Ok(())
}

/// Load a bundle file into its descriptors, in bundle order
pub fn load(path: &Path, registry: &PatchRegistry) -> Result<Vec<PatchDescriptor>> {
    Ok(PatchBundle::load(path, registry)?
        .descriptors()
        .cloned()
        .collect())
}
