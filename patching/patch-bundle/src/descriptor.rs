//! Patch metadata as published in a bundle manifest

use crate::PatchError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata describing one patch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchDescriptor {
    /// Unique identifier within a bundle
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Patch version
    #[serde(default)]
    pub version: String,
    /// What the patch does
    #[serde(default)]
    pub description: String,
    /// Packages the patch was written for; empty means any package
    #[serde(default)]
    pub compatible_packages: Vec<CompatiblePackage>,
    /// Options the user may configure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<PatchOption>>,
}

impl PatchDescriptor {
    /// Whether the patch declares at least one option
    pub fn has_options(&self) -> bool {
        self.options.as_ref().is_some_and(|options| !options.is_empty())
    }

    /// Look up a declared option
    pub fn option(&self, key: &str) -> Option<&PatchOption> {
        self.options
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|option| option.key == key)
    }

    /// Whether the patch declares no compatible packages
    pub fn is_universal(&self) -> bool {
        self.compatible_packages.is_empty()
    }
}

/// A package a patch was written for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatiblePackage {
    /// Package name
    pub package_name: String,
    /// Versions the patch is known to work on; empty means all versions
    #[serde(default)]
    pub allowed_versions: Vec<String>,
}

impl CompatiblePackage {
    /// Whether `version` is outside the allowed list
    pub fn rejects_version(&self, version: &str) -> bool {
        !self.allowed_versions.is_empty() && !self.allowed_versions.iter().any(|v| v == version)
    }
}

/// A configurable option of a patch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchOption {
    /// Key used to set and read the value
    pub key: String,
    /// Short label
    pub title: String,
    /// Longer explanation
    #[serde(default)]
    pub description: String,
    /// Value used when the user sets none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Whether the patch cannot run without a value
    #[serde(default)]
    pub required: bool,
}

/// Option values for one patch, key to value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionValues(BTreeMap<String, String>);

impl OptionValues {
    /// Empty set of values
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Set `key`, returning the previous value
    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove `key`, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Iterate over keys and values in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no value is set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values a patch runs with: user values over declared defaults
    ///
    /// Fails when a required option ends up without a value. Values for keys
    /// the descriptor does not declare are dropped.
    pub fn effective(
        descriptor: &PatchDescriptor,
        user: Option<&OptionValues>,
    ) -> Result<OptionValues, PatchError> {
        let mut values = OptionValues::new();
        for option in descriptor.options.as_deref().unwrap_or_default() {
            let value = user
                .and_then(|u| u.get(&option.key))
                .map(str::to_string)
                .or_else(|| option.default.clone());
            match value {
                Some(value) => {
                    values.set(option.key.clone(), value);
                }
                None if option.required => {
                    return Err(PatchError::InvalidOption {
                        key: option.key.clone(),
                        message: "required option has no value".to_string(),
                    });
                }
                None => {}
            }
        }
        Ok(values)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OptionValues {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
