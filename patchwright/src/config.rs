//! `patchwright.yaml` settings

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "patchwright.yaml";

/// Settings shared by all commands
///
/// Every field has a default; a missing file means all defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Repository publishing patch bundles
    pub patches_source: String,
    /// Repository publishing integration archives
    pub integrations_source: String,
    /// GitHub-compatible API endpoint
    pub api_base_url: String,
    /// Where downloaded assets are kept
    pub cache_dir: Option<PathBuf>,
    /// Where per-job scratch directories are created
    pub work_dir: Option<PathBuf>,
    /// Where the signing key and certificate live
    pub keystore_dir: Option<PathBuf>,
    /// Common name of a newly generated signing certificate
    pub signer_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            patches_source: patch_assets::DEFAULT_PATCHES_SOURCE.to_string(),
            integrations_source: patch_assets::DEFAULT_INTEGRATIONS_SOURCE.to_string(),
            api_base_url: patch_assets::DEFAULT_API_BASE_URL.to_string(),
            cache_dir: None,
            work_dir: None,
            keystore_dir: None,
            signer_name: apk_sign::DEFAULT_COMMON_NAME.to_string(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "patchwright")
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Load `path`, or the default file when `path` is `None`
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => {
                    log::debug!("No configuration file; using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration text
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(text)?)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Asset cache directory
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            project_dirs()
                .map(|dirs| dirs.cache_dir().join("assets"))
                .unwrap_or_else(|| PathBuf::from(".patchwright").join("cache"))
        })
    }

    /// Root of per-job scratch directories
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Keystore directory
    pub fn keystore_dir(&self) -> PathBuf {
        self.keystore_dir.clone().unwrap_or_else(|| {
            project_dirs()
                .map(|dirs| dirs.data_dir().join("keystore"))
                .unwrap_or_else(|| PathBuf::from(".patchwright").join("keystore"))
        })
    }
}
