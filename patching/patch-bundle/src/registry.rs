//! Mapping from manifest implementation keys to patch code

use crate::Patch;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Creates a patch instance
pub type PatchFactory = Box<dyn Fn() -> Arc<dyn Patch> + Send + Sync>;

/// Patch implementations known to the host
#[derive(Default)]
pub struct PatchRegistry {
    factories: BTreeMap<String, PatchFactory>,
}

impl fmt::Debug for PatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchRegistry")
            .field("keys", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PatchRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `key`, replacing any earlier one
    pub fn register<K, F>(&mut self, key: K, factory: F) -> &mut Self
    where
        K: Into<String>,
        F: Fn() -> Arc<dyn Patch> + Send + Sync + 'static,
    {
        let key = key.into();
        if self.factories.insert(key.clone(), Box::new(factory)).is_some() {
            log::warn!("Patch implementation '{}' registered twice; keeping the last", key);
        }
        self
    }

    /// Register a stateless patch under `key`
    pub fn register_patch<K, P>(&mut self, key: K, patch: P) -> &mut Self
    where
        K: Into<String>,
        P: Patch + 'static,
    {
        let patch: Arc<dyn Patch> = Arc::new(patch);
        self.register(key, move || Arc::clone(&patch))
    }

    /// Create the implementation registered under `key`
    pub fn create(&self, key: &str) -> Option<Arc<dyn Patch>> {
        self.factories.get(key).map(|factory| factory())
    }

    /// Whether `key` is registered
    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Number of registered implementations
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
