//! Network access to the release host

use crate::release::SourceId;
use crate::{Error, Result};
use std::io::Write;
use std::time::Duration;

/// Public GitHub API
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("patchwright/", env!("CARGO_PKG_VERSION"));

/// Everything the cache needs from the network
///
/// The cache only talks to this trait so it can be driven without a network.
pub trait Transport: Send + Sync {
    /// GET a JSON document
    fn get_json(&self, url: &str) -> Result<serde_json::Value>;

    /// Stream the body at `url` into `sink`, returning the byte count
    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64>;

    /// URL of the latest-release document for `source`
    fn latest_release_url(&self, source: &SourceId) -> String;
}

/// Blocking HTTP transport for the GitHub releases API
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    api_base_url: String,
}

impl HttpTransport {
    /// Transport for the public GitHub API
    pub fn new() -> Result<Self> {
        Self::with_api_base_url(DEFAULT_API_BASE_URL)
    }

    /// Transport for a GitHub-compatible API at another address
    pub fn with_api_base_url(api_base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(300))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::download(api_base_url, None, e.to_string()))?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// API base URL in use
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    fn send(&self, url: &str, accept: &str) -> Result<reqwest::blocking::Response> {
        let response = self
            .client
            .get(url)
            .header("Accept", accept)
            .send()
            .map_err(|e| Error::download(url, None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(Error::download(url, Some(status.as_u16()), message));
        }
        Ok(response)
    }
}

impl Transport for HttpTransport {
    fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        log::debug!("GET {}", url);
        self.send(url, "application/vnd.github+json")?
            .json()
            .map_err(|e| Error::download(url, None, format!("invalid JSON: {}", e)))
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        log::debug!("Downloading {}", url);
        let mut response = self.send(url, "application/octet-stream")?;
        response
            .copy_to(sink)
            .map_err(|e| Error::download(url, None, e.to_string()))
    }

    fn latest_release_url(&self, source: &SourceId) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base_url,
            source.owner(),
            source.repo()
        )
    }
}
