//! Release asset download

use anyhow::{Context, Result};
use patch_assets::{AssetCache, HttpTransport, SourceId};
use std::sync::Arc;

use crate::cli::FetchArgs;
use crate::config::Config;
use crate::utils::{create_spinner, format_bytes};

/// Asset cache over HTTP, as configured
pub(crate) fn asset_cache(config: &Config) -> Result<AssetCache> {
    let transport = HttpTransport::with_api_base_url(&config.api_base_url)
        .context("Failed to create HTTP client")?;
    Ok(AssetCache::new(config.cache_dir(), Arc::new(transport)))
}

pub fn execute(args: FetchArgs, config: &Config) -> Result<()> {
    let source = match (&args.source, args.integrations) {
        (Some(source), _) => source.as_str(),
        (None, true) => config.integrations_source.as_str(),
        (None, false) => config.patches_source.as_str(),
    };
    let source: SourceId = source
        .parse()
        .with_context(|| format!("Invalid source '{}'", source))?;

    let cache = asset_cache(config)?;
    let spinner = create_spinner(&format!("Fetching latest release of {}...", source));
    let artifact = cache.fetch_latest(&source);
    spinner.finish_and_clear();
    let artifact = artifact.with_context(|| format!("Failed to fetch {}", source))?;

    let size = std::fs::metadata(&artifact.path)
        .map(|m| m.len())
        .unwrap_or_default();
    println!(
        "{} {} ({}{})",
        artifact.asset,
        artifact.tag,
        format_bytes(size),
        if artifact.cache_hit { ", cached" } else { "" }
    );
    println!("{}", artifact.path.display());
    Ok(())
}
