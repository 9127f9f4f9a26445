//! On-disk cache of downloaded release assets
//!
//! Files are keyed by release tag and asset name and stored as
//! `{dir}/{tag}-{asset}`. A cached file is trusted as-is: it is never
//! re-verified or refreshed. Downloads land in a temporary file inside the
//! cache directory and are renamed into place when complete, so an
//! interrupted transfer never leaves a file under the final name.

use crate::release::{Asset, Release, SourceId, select_asset};
use crate::transport::Transport;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A fetched asset together with the release it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    /// Local file
    pub path: PathBuf,
    /// Release tag
    pub tag: String,
    /// Asset name
    pub asset: String,
    /// Whether the file was already cached
    pub cache_hit: bool,
}

/// Release asset cache backed by a directory
pub struct AssetCache {
    dir: PathBuf,
    transport: Arc<dyn Transport>,
    in_flight: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetCache").field("dir", &self.dir).finish()
    }
}

impl AssetCache {
    /// Cache in `dir` using `transport` for network access
    pub fn new<P: Into<PathBuf>>(dir: P, transport: Arc<dyn Transport>) -> Self {
        Self {
            dir: dir.into(),
            transport,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Look up the latest release of `source`
    pub fn resolve_latest(&self, source: &SourceId) -> Result<Release> {
        let url = self.transport.latest_release_url(source);
        let document = self.transport.get_json(&url)?;
        let release: Release = serde_json::from_value(document).map_err(|e| {
            Error::download(&url, None, format!("unexpected release document: {}", e))
        })?;
        log::info!(
            "Latest release of {} is {} ({} assets)",
            source,
            release.tag,
            release.assets.len()
        );
        Ok(release)
    }

    /// Where an asset of a release is stored
    pub fn cache_path(&self, release: &Release, asset: &Asset) -> PathBuf {
        self.dir.join(format!(
            "{}-{}",
            sanitize(&release.tag),
            sanitize(&asset.name)
        ))
    }

    /// Return the cached copy of `asset`, downloading it first if needed
    pub fn fetch(&self, release: &Release, asset: &Asset) -> Result<CachedArtifact> {
        let path = self.cache_path(release, asset);
        let artifact = |cache_hit| CachedArtifact {
            path: path.clone(),
            tag: release.tag.clone(),
            asset: asset.name.clone(),
            cache_hit,
        };

        if path.is_file() {
            log::debug!("Cache hit for {}", path.display());
            return Ok(artifact(true));
        }

        // Concurrent fetches of one key wait here; the loser sees the file.
        let key_lock = self.key_lock(&path);
        let _guard = key_lock.lock();
        if path.is_file() {
            log::debug!("{} was downloaded by a concurrent fetch", path.display());
            self.release_key(&path);
            return Ok(artifact(true));
        }

        let result = self.download_into(&asset.download_url, &path);
        self.release_key(&path);
        result?;
        Ok(artifact(false))
    }

    /// Resolve, select and fetch the latest binary asset of `source`
    pub fn fetch_latest(&self, source: &SourceId) -> Result<CachedArtifact> {
        let release = self.resolve_latest(source)?;
        let asset = select_asset(&release)?;
        self.fetch(&release, asset)
    }

    fn download_into(&self, url: &str, path: &Path) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        log::info!("Downloading {} -> {}", url, path.display());

        let staging = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(&self.dir)?;
        let mut writer = BufWriter::new(staging.as_file());
        let bytes = self.transport.download(url, &mut writer)?;
        writer.flush()?;
        drop(writer);
        staging.as_file().sync_all()?;

        staging.persist(path).map_err(|e| Error::Io(e.error))?;
        log::debug!("Cached {} bytes at {}", bytes, path.display());
        Ok(())
    }

    fn key_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        self.in_flight
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }

    fn release_key(&self, path: &Path) {
        let mut in_flight = self.in_flight.lock();
        if let Some(lock) = in_flight.get(path) {
            // One reference in the map, one held by the caller.
            if Arc::strong_count(lock) <= 2 {
                in_flight.remove(path);
            }
        }
    }
}

/// Keep cache file names inside the cache directory
fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
