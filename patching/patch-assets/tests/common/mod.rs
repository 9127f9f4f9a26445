//! Common test utilities and fixtures

#![allow(dead_code)]

use patch_assets::{Error, Result, SourceId, Transport};
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Create a temporary directory for tests
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// In-memory release host that counts requests
#[derive(Default)]
pub struct FakeTransport {
    pub releases: HashMap<String, serde_json::Value>,
    pub files: HashMap<String, Vec<u8>>,
    pub downloads: AtomicUsize,
    pub lookups: AtomicUsize,
    pub delay: Option<Duration>,
    pub fail_after: Option<usize>,
}

impl FakeTransport {
    pub fn with_release(mut self, source: &str, tag: &str, assets: &[(&str, &[u8])]) -> Self {
        let assets: Vec<_> = assets
            .iter()
            .map(|(name, data)| {
                let url = format!("https://fake/{}/{}/{}", source, tag, name);
                self.files.insert(url.clone(), data.to_vec());
                serde_json::json!({ "name": name, "browser_download_url": url })
            })
            .collect();
        self.releases.insert(
            format!("https://fake/repos/{}/releases/latest", source),
            serde_json::json!({ "tag_name": tag, "assets": assets }),
        );
        self
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl Transport for FakeTransport {
    fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.releases
            .get(url)
            .cloned()
            .ok_or_else(|| Error::download(url, Some(404), "Not Found"))
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let data = self
            .files
            .get(url)
            .ok_or_else(|| Error::download(url, Some(404), "Not Found"))?;
        match self.fail_after {
            Some(limit) => {
                sink.write_all(&data[..limit.min(data.len())])?;
                Err(Error::download(url, None, "connection reset"))
            }
            None => {
                sink.write_all(data)?;
                Ok(data.len() as u64)
            }
        }
    }

    fn latest_release_url(&self, source: &SourceId) -> String {
        format!("https://fake/repos/{}/releases/latest", source)
    }
}
