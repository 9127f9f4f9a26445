//! # apk_sign - APK signing for patched packages
//!
//! Signs aligned Android packages with APK Signature Scheme v2 using a
//! manager-owned RSA identity, and verifies such signatures.
//!
//! A patched package is never signed with the original developer's key, so it
//! cannot be installed as an update over the original application.
//!
//! ## Examples
//!
//! ```no_run
//! use apk_sign::{sign, verify, KeyStore, DEFAULT_COMMON_NAME};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), apk_sign::Error> {
//! let identity = KeyStore::load_or_create(Path::new("keystore"), DEFAULT_COMMON_NAME)?;
//! sign(Path::new("aligned.apk"), Path::new("signed.apk"), &identity)?;
//!
//! let signer = verify(Path::new("signed.apk"))?;
//! println!("Signed by {:?}", signer.certificate.subject_common_name());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod certificate;
pub mod error;
pub mod identity;
pub mod v2;

pub use certificate::Certificate;
pub use error::{Error, Result};
pub use identity::{
    CERTIFICATE_FILE_NAME, DEFAULT_COMMON_NAME, DEFAULT_KEY_BITS, KEY_FILE_NAME, KeyStore,
    SigningIdentity,
};
pub use v2::{VerifiedSigner, sign_bytes, verify_bytes};

use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Sign `input` and publish the result at `output`
///
/// The signed archive is written to a temporary file next to `output` and
/// renamed into place only once it is complete, so a failure never leaves a
/// partial file at `output`.
pub fn sign(input: &Path, output: &Path, identity: &SigningIdentity) -> Result<()> {
    log::info!("Signing {} -> {}", input.display(), output.display());
    let apk = fs::read(input)?;
    let signed = sign_bytes(&apk, identity)?;
    write_atomically(output, &signed)?;
    log::debug!("Signed archive is {} bytes", signed.len());
    Ok(())
}

/// Verify the v2 signature of the archive at `path`
pub fn verify(path: &Path) -> Result<VerifiedSigner> {
    log::debug!("Verifying {}", path.display());
    verify_bytes(&fs::read(path)?)
}

/// Write `contents` to `path` through a temporary file in the same directory
pub fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
