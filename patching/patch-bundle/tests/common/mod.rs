//! Common test utilities and fixtures

#![allow(dead_code)]

use patch_bundle::{OptionValues, PatchContext, PatchError, PatchRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Create a temporary directory for tests
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Create a test file with specific content
pub fn create_test_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

fn noop(_: &mut dyn PatchContext, _: &OptionValues) -> Result<(), PatchError> {
    Ok(())
}

/// Registry with the implementations the fixture manifests use
pub fn registry() -> Arc<PatchRegistry> {
    let mut registry = PatchRegistry::new();
    registry
        .register_patch("ads.remove", noop)
        .register_patch("theme.dark", noop);
    Arc::new(registry)
}

/// Manifest with two patches
pub const MANIFEST: &str = r#"{
    "patches": [
        {
            "id": "remove-ads",
            "name": "Remove ads",
            "version": "1.0.0",
            "description": "Removes advertisements",
            "implementation": "ads.remove",
            "compatiblePackages": [
                {"packageName": "com.example.app", "allowedVersions": ["1.0", "1.1"]}
            ]
        },
        {
            "id": "dark-mode",
            "name": "Dark mode",
            "implementation": "theme.dark",
            "options": [
                {"key": "amoled", "title": "Pure black", "default": "false"}
            ]
        }
    ]
}"#;

/// The manifest inside a zip container, next to unrelated entries
pub fn zipped_manifest(manifest: &str) -> Vec<u8> {
    let mut writer = apk_zip::ZipWriter::new(Vec::new());
    writer.add_deflated("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n").unwrap();
    writer.add_deflated(patch_bundle::MANIFEST_NAME, manifest.as_bytes()).unwrap();
    writer.finish(b"").unwrap()
}
