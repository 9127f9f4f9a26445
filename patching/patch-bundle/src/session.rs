//! Bundle, target and selection state shared by a front end and the runner

use crate::resolver::{ResolvedPatch, resolve};
use crate::{Error, OptionValues, PatchBundle, PatchRegistry, Result};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

/// An installed application, as reported by the OS package inventory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetPackage {
    /// Package name, e.g. `com.example.app`
    pub package_name: String,
    /// Installed version name
    pub version_name: String,
}

impl TargetPackage {
    /// Create a target
    pub fn new<P: Into<String>, V: Into<String>>(package_name: P, version_name: V) -> Self {
        Self {
            package_name: package_name.into(),
            version_name: version_name.into(),
        }
    }
}

/// State of one manager session
///
/// The loaded bundle can be read and replaced through `&self`; readers get a
/// snapshot that later reloads do not affect. Target, selection and options
/// change only through `&mut self`.
#[derive(Debug)]
pub struct Session {
    registry: Arc<PatchRegistry>,
    bundle: RwLock<Arc<PatchBundle>>,
    target: Option<TargetPackage>,
    selection: BTreeSet<String>,
    options: HashMap<String, OptionValues>,
}

impl Session {
    /// New session with an empty bundle
    pub fn new(registry: Arc<PatchRegistry>) -> Self {
        Self {
            registry,
            bundle: RwLock::new(Arc::new(PatchBundle::empty())),
            target: None,
            selection: BTreeSet::new(),
            options: HashMap::new(),
        }
    }

    /// Registry bundles are loaded against
    pub fn registry(&self) -> &PatchRegistry {
        &self.registry
    }

    /// Snapshot of the current bundle
    pub fn bundle(&self) -> Arc<PatchBundle> {
        Arc::clone(&self.bundle.read())
    }

    /// Load a bundle file and make it current
    ///
    /// On failure the previous bundle stays current.
    pub fn load_bundle(&self, path: &Path) -> Result<Arc<PatchBundle>> {
        match PatchBundle::load(path, &self.registry) {
            Ok(bundle) => {
                let bundle = Arc::new(bundle);
                *self.bundle.write() = Arc::clone(&bundle);
                log::info!("Loaded {} patches from {}", bundle.len(), path.display());
                Ok(bundle)
            }
            Err(e) => {
                log::warn!(
                    "Failed to load {}; keeping the previous bundle: {}",
                    path.display(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Make `bundle` current
    pub fn replace_bundle(&self, bundle: PatchBundle) {
        *self.bundle.write() = Arc::new(bundle);
    }

    /// Currently selected target
    pub fn target(&self) -> Option<&TargetPackage> {
        self.target.as_ref()
    }

    /// Select a target
    ///
    /// Choosing a different package clears the selection and option values.
    /// A new version of the same package keeps them.
    pub fn set_target(&mut self, target: TargetPackage) {
        let same_package = self
            .target
            .as_ref()
            .is_some_and(|current| current.package_name == target.package_name);
        if !same_package && (!self.selection.is_empty() || !self.options.is_empty()) {
            log::debug!(
                "Target changed to {}; clearing {} selected patches",
                target.package_name,
                self.selection.len()
            );
            self.selection.clear();
            self.options.clear();
        }
        self.target = Some(target);
    }

    /// Resolve the current bundle against the current target
    ///
    /// Empty when no target is selected.
    pub fn resolve(&self) -> Vec<ResolvedPatch> {
        match &self.target {
            Some(target) => resolve(&self.bundle(), &target.package_name, &target.version_name),
            None => Vec::new(),
        }
    }

    /// Select or deselect one patch
    pub fn select(&mut self, id: &str, selected: bool) {
        if selected {
            self.selection.insert(id.to_string());
        } else {
            self.selection.remove(id);
        }
    }

    /// Select every supported patch of `patches`, or deselect all of them
    pub fn select_all(&mut self, patches: &[ResolvedPatch], selected: bool) {
        for patch in patches {
            let id = patch.descriptor.id.as_str();
            if selected && !patch.unsupported {
                self.selection.insert(id.to_string());
            } else {
                self.selection.remove(id);
            }
        }
    }

    /// Whether a patch is selected
    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.contains(id)
    }

    /// Whether anything is selected
    pub fn any_selected(&self) -> bool {
        !self.selection.is_empty()
    }

    /// Selected ids in sorted order
    pub fn selected_ids(&self) -> impl Iterator<Item = &str> {
        self.selection.iter().map(String::as_str)
    }

    /// Set an option value of a patch in the current bundle
    pub fn set_option(&mut self, id: &str, key: &str, value: &str) -> Result<()> {
        let bundle = self.bundle();
        let patch = bundle
            .get(id)
            .ok_or_else(|| Error::UnknownPatch(id.to_string()))?;
        if patch.descriptor.option(key).is_none() {
            return Err(Error::UnknownOption {
                id: id.to_string(),
                key: key.to_string(),
            });
        }
        self.options
            .entry(id.to_string())
            .or_default()
            .set(key, value);
        Ok(())
    }

    /// Value the user set for an option
    pub fn option(&self, id: &str, key: &str) -> Option<&str> {
        self.options.get(id).and_then(|values| values.get(key))
    }

    /// All values the user set for a patch
    pub fn options_for(&self, id: &str) -> Option<&OptionValues> {
        self.options.get(id)
    }

    /// Every patch's user values
    pub fn all_options(&self) -> &HashMap<String, OptionValues> {
        &self.options
    }
}
