//! # patch_assets - Release lookup and asset caching
//!
//! Finds the latest release of a patch or integration repository, picks its
//! installable binary and keeps a local copy keyed by release tag and asset
//! name.
//!
//! ```no_run
//! use patch_assets::{AssetCache, HttpTransport, SourceId};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), patch_assets::Error> {
//! let cache = AssetCache::new("cache", Arc::new(HttpTransport::new()?));
//! let source: SourceId = "revanced/revanced-integrations".parse()?;
//! let artifact = cache.fetch_latest(&source)?;
//! println!("{} -> {}", artifact.tag, artifact.path.display());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod cache;
pub mod error;
pub mod release;
pub mod transport;

pub use cache::{AssetCache, CachedArtifact};
pub use error::{Error, Result};
pub use release::{Asset, Release, SourceId, select_asset};
pub use transport::{DEFAULT_API_BASE_URL, HttpTransport, Transport};

/// Default repository for patch bundles
pub const DEFAULT_PATCHES_SOURCE: &str = "revanced/revanced-patches";

/// Default repository for integration archives
pub const DEFAULT_INTEGRATIONS_SOURCE: &str = "revanced/revanced-integrations";
