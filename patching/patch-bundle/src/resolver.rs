//! Which patches apply to a target package and version

use crate::{PatchBundle, PatchDescriptor};
use std::collections::HashSet;

/// A descriptor as seen for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPatch {
    /// The patch
    pub descriptor: PatchDescriptor,
    /// The target version is outside the versions the patch allows
    pub unsupported: bool,
    /// The patch declares options
    pub has_options: bool,
}

/// Resolve every patch of a bundle against a target
pub fn resolve(bundle: &PatchBundle, package_name: &str, version: &str) -> Vec<ResolvedPatch> {
    resolve_descriptors(bundle.descriptors(), package_name, version)
}

/// Resolve descriptors against a target, keeping their order
///
/// - A patch that declares no packages applies to every target.
/// - Otherwise the patch yields one entry per declared package whose name
///   matches, and is absent when none matches. Each entry is unsupported
///   when its own allowed versions are non-empty and do not list `version`.
pub fn resolve_descriptors<'a, I>(
    descriptors: I,
    package_name: &str,
    version: &str,
) -> Vec<ResolvedPatch>
where
    I: IntoIterator<Item = &'a PatchDescriptor>,
{
    let mut resolved = Vec::new();

    for descriptor in descriptors {
        let has_options = descriptor.has_options();
        if has_options {
            log::trace!("{} has options", descriptor.id);
        }

        if descriptor.is_universal() {
            resolved.push(ResolvedPatch {
                descriptor: descriptor.clone(),
                unsupported: false,
                has_options,
            });
            continue;
        }

        for package in &descriptor.compatible_packages {
            if package.package_name != package_name {
                continue;
            }
            resolved.push(ResolvedPatch {
                descriptor: descriptor.clone(),
                unsupported: package.rejects_version(version),
                has_options,
            });
        }
    }

    log::debug!(
        "Resolved {} entries for {} {}",
        resolved.len(),
        package_name,
        version
    );
    resolved
}

/// Keep the first entry per patch id
pub fn dedup_by_id(resolved: Vec<ResolvedPatch>) -> Vec<ResolvedPatch> {
    let mut seen = HashSet::new();
    resolved
        .into_iter()
        .filter(|entry| seen.insert(entry.descriptor.id.clone()))
        .collect()
}
