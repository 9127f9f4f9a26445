//! Common test utilities and fixtures

#![allow(dead_code)]

use apk_sign::SigningIdentity;
use apk_zip::ZipWriter;
use std::sync::OnceLock;
use tempfile::TempDir;

/// Create a temporary directory for tests
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// A small identity shared by all tests; key generation is slow
pub fn test_identity() -> &'static SigningIdentity {
    static IDENTITY: OnceLock<SigningIdentity> = OnceLock::new();
    IDENTITY.get_or_init(|| {
        SigningIdentity::generate("Patchwright Test", 1024).expect("Failed to generate identity")
    })
}

/// An aligned-looking package with a native library
pub fn sample_package() -> Vec<u8> {
    let mut writer = ZipWriter::new(Vec::new());
    writer
        .add_deflated("AndroidManifest.xml", b"<manifest package=\"com.example.app\"/>")
        .unwrap();
    writer.add_deflated("classes.dex", &vec![0x64; 4096]).unwrap();
    writer
        .add_stored("lib/x86_64/libapp.so", &(0..3000u32).map(|i| i as u8).collect::<Vec<_>>())
        .unwrap();
    writer.finish(b"").unwrap()
}
