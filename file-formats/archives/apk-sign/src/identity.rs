//! Signing identity and its on-disk key store

use crate::certificate::Certificate;
use crate::{Error, Result};
use rand_core::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use std::fs;
use std::path::{Path, PathBuf};

/// Key size for generated identities
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Common name used when the caller does not choose one
pub const DEFAULT_COMMON_NAME: &str = "Patchwright";

/// File holding the PKCS#8 private key
pub const KEY_FILE_NAME: &str = "signing-key.pem";

/// File holding the PEM certificate
pub const CERTIFICATE_FILE_NAME: &str = "signing-cert.pem";

/// Private key plus the certificate that vouches for it
#[derive(Debug, Clone)]
pub struct SigningIdentity {
    key: RsaPrivateKey,
    certificate: Certificate,
}

impl SigningIdentity {
    /// Pair a key with its certificate
    ///
    /// Fails when the certificate was issued for a different key.
    pub fn new(key: RsaPrivateKey, certificate: Certificate) -> Result<Self> {
        let public_key_info = key
            .to_public_key()
            .to_public_key_der()
            .map_err(|e| Error::key(format!("Failed to encode public key: {}", e)))?;
        if public_key_info.as_bytes() != certificate.public_key_info() {
            return Err(Error::certificate(
                "Certificate public key does not match the private key",
            ));
        }
        Ok(Self { key, certificate })
    }

    /// Generate a fresh key and a self-signed certificate
    pub fn generate(common_name: &str, bits: usize) -> Result<Self> {
        log::info!("Generating {}-bit RSA signing key for CN={}", bits, common_name);
        let key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| Error::key(format!("Failed to generate key: {}", e)))?;
        let certificate = Certificate::self_signed(&key, common_name)?;
        Ok(Self { key, certificate })
    }

    /// Private key
    pub fn key(&self) -> &RsaPrivateKey {
        &self.key
    }

    /// Certificate
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }
}

/// Directory holding the manager's signing key and certificate
#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    /// Key store rooted at `dir`
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the private key file
    pub fn key_path(&self) -> PathBuf {
        self.dir.join(KEY_FILE_NAME)
    }

    /// Path of the certificate file
    pub fn certificate_path(&self) -> PathBuf {
        self.dir.join(CERTIFICATE_FILE_NAME)
    }

    /// Whether both files exist
    pub fn exists(&self) -> bool {
        self.key_path().is_file() && self.certificate_path().is_file()
    }

    /// Load the stored identity, creating one on first use
    pub fn load_or_create(dir: &Path, common_name: &str) -> Result<SigningIdentity> {
        Self::new(dir).load_or_create_with(common_name, DEFAULT_KEY_BITS)
    }

    /// Like [`KeyStore::load_or_create`], with an explicit key size
    pub fn load_or_create_with(&self, common_name: &str, bits: usize) -> Result<SigningIdentity> {
        if self.exists() {
            return self.load();
        }
        if self.key_path().exists() || self.certificate_path().exists() {
            return Err(Error::key(format!(
                "Key store {} is incomplete: expected both {} and {}",
                self.dir.display(),
                KEY_FILE_NAME,
                CERTIFICATE_FILE_NAME
            )));
        }

        let identity = SigningIdentity::generate(common_name, bits)?;
        self.store(&identity)?;
        Ok(identity)
    }

    /// Load an existing identity
    pub fn load(&self) -> Result<SigningIdentity> {
        log::debug!("Loading signing identity from {}", self.dir.display());
        let key_pem = fs::read_to_string(self.key_path())?;
        let key = RsaPrivateKey::from_pkcs8_pem(&key_pem)
            .map_err(|e| Error::key(format!("Invalid {}: {}", KEY_FILE_NAME, e)))?;
        let certificate = Certificate::from_pem(&fs::read_to_string(self.certificate_path())?)?;
        SigningIdentity::new(key, certificate)
    }

    /// Write an identity to the store
    pub fn store(&self, identity: &SigningIdentity) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let key_pem = identity
            .key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| Error::key(format!("Failed to encode private key: {}", e)))?;

        write_private(&self.key_path(), key_pem.as_bytes())?;
        fs::write(self.certificate_path(), identity.certificate.to_pem())?;
        log::info!("Stored signing identity in {}", self.dir.display());
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents)?;
    Ok(())
}
