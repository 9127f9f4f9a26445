//! Release metadata and asset selection

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Asset name fragments that mark an installable binary
const BINARY_MARKERS: &[&str] = &[".apk", ".dex"];

/// Asset name fragments that mark source or documentation archives
const EXCLUDED_MARKERS: &[&str] = &["-sources", "-javadoc"];

/// A repository that publishes releases, written `owner/repo`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId {
    owner: String,
    repo: String,
}

impl SourceId {
    /// Repository owner
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name
    pub fn repo(&self) -> &str {
        &self.repo
    }
}

impl FromStr for SourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let valid_part = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };

        match s.split_once('/') {
            Some((owner, repo)) if valid_part(owner) && valid_part(repo) => Ok(Self {
                owner: owner.to_string(),
                repo: repo.to_string(),
            }),
            _ => Err(Error::InvalidSource(s.to_string())),
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A published release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Version label, unique per source
    #[serde(rename = "tag_name")]
    pub tag: String,
    /// Downloadable files
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// A downloadable file of a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// File name
    pub name: String,
    /// Where to download it from
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

impl Asset {
    /// Whether the asset looks like an installable binary
    pub fn is_binary(&self) -> bool {
        BINARY_MARKERS.iter().any(|m| self.name.contains(m))
            && !EXCLUDED_MARKERS.iter().any(|m| self.name.contains(m))
    }
}

/// Pick the first installable binary of a release
pub fn select_asset(release: &Release) -> Result<&Asset> {
    release
        .assets
        .iter()
        .find(|asset| asset.is_binary())
        .ok_or_else(|| Error::AssetNotFound {
            tag: release.tag.clone(),
        })
}
