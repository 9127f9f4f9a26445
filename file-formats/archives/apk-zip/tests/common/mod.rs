//! Common test utilities and fixtures

#![allow(dead_code)]

use apk_zip::ZipWriter;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a temporary directory for tests
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// How an entry of a fixture archive is written
#[derive(Debug, Clone)]
pub enum Fixture {
    Deflated(&'static str, Vec<u8>),
    Stored(&'static str, Vec<u8>),
}

/// Build an archive in memory
pub fn build_archive(entries: &[Fixture]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Vec::new());
    for entry in entries {
        match entry {
            Fixture::Deflated(name, data) => writer.add_deflated(name, data).unwrap(),
            Fixture::Stored(name, data) => writer.add_stored(name, data).unwrap(),
        }
    }
    writer.finish(b"").unwrap()
}

/// A small package with the usual Android layout
pub fn sample_package() -> Vec<u8> {
    build_archive(&[
        Fixture::Deflated(
            "AndroidManifest.xml",
            b"<manifest package=\"com.example.app\"/>".to_vec(),
        ),
        Fixture::Deflated("classes.dex", generate_repetitive_data(b"dex\n035\0", 3000)),
        Fixture::Stored("resources.arsc", generate_test_data(517)),
        Fixture::Stored("lib/arm64-v8a/libnative.so", generate_test_data(9001)),
        Fixture::Deflated("res/layout/main.xml", b"<LinearLayout/>".to_vec()),
        Fixture::Stored("assets/odd.bin", vec![1, 2, 3]),
    ])
}

/// Generate test data of a specific size
pub fn generate_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Generate repetitive test data (good for compression tests)
pub fn generate_repetitive_data(pattern: &[u8], total_size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(total_size);
    while data.len() < total_size {
        let chunk_size = (total_size - data.len()).min(pattern.len());
        data.extend_from_slice(&pattern[..chunk_size]);
    }
    data
}

/// Create a test file with specific content
pub fn create_test_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}
