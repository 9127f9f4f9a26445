//! Command implementations

pub mod archive;
pub mod config;
pub mod fetch;
pub mod patch;
pub mod patches;

use crate::config::Config;
use anyhow::{Context, Result};
use apk_sign::{DEFAULT_KEY_BITS, KeyStore, SigningIdentity};

use crate::utils::create_spinner;

/// Load the manager's signing identity, creating it on first use
pub(crate) fn signing_identity(config: &Config) -> Result<SigningIdentity> {
    let store = KeyStore::new(config.keystore_dir());
    let spinner = create_spinner(if store.exists() {
        "Loading signing key..."
    } else {
        "Generating signing key..."
    });
    let identity = store
        .load_or_create_with(&config.signer_name, DEFAULT_KEY_BITS)
        .with_context(|| {
            format!(
                "Failed to prepare signing identity in {}",
                config.keystore_dir().display()
            )
        })?;
    spinner.finish_and_clear();
    Ok(identity)
}
