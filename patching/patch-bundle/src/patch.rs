//! The capability every patch implements

use crate::{OptionValues, PatchError};

/// View of the package being patched, provided by the patching engine
///
/// Code units are the package's compiled code files (`classes.dex`,
/// `classes2.dex`, ...). Resources are every other archive entry.
pub trait PatchContext {
    /// Names of all code units, in engine order
    fn code_unit_names(&self) -> Vec<String>;

    /// Contents of a code unit
    fn code_unit(&self, name: &str) -> Option<&[u8]>;

    /// Add or replace a code unit
    fn put_code_unit(&mut self, name: &str, data: Vec<u8>);

    /// Names of all resources currently in the package
    fn resource_names(&self) -> Vec<String>;

    /// Contents of a resource, reflecting earlier edits
    fn resource(&self, name: &str) -> Result<Option<Vec<u8>>, PatchError>;

    /// Add or replace a resource
    fn put_resource(&mut self, name: &str, data: Vec<u8>);

    /// Remove a resource, returning whether it existed
    fn remove_resource(&mut self, name: &str) -> bool;
}

/// A modification to an application package
///
/// Implementations are compiled into the host and looked up through a
/// [`PatchRegistry`](crate::PatchRegistry) by the key a bundle manifest names.
pub trait Patch: Send + Sync {
    /// Apply the patch
    ///
    /// `options` holds the effective option values: the user's choices over
    /// the descriptor's defaults.
    fn apply(&self, ctx: &mut dyn PatchContext, options: &OptionValues) -> Result<(), PatchError>;
}

impl<F> Patch for F
where
    F: Fn(&mut dyn PatchContext, &OptionValues) -> Result<(), PatchError> + Send + Sync,
{
    fn apply(&self, ctx: &mut dyn PatchContext, options: &OptionValues) -> Result<(), PatchError> {
        self(ctx, options)
    }
}
