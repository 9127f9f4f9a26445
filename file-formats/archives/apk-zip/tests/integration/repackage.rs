//! Merge and align through files on disk

use crate::common::*;
use apk_zip::{CodeUnit, Error, ZipArchive, align, check_alignment, merge};
use pretty_assertions::assert_eq;

#[test]
fn test_merge_then_align_produces_aligned_package() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = temp_dir();
    let base = create_test_file(dir.path(), "base.apk", &sample_package());
    let patched = dir.path().join("patched.apk");
    let aligned = dir.path().join("aligned.apk");

    let units = vec![
        CodeUnit::new("classes.dex", b"patched classes".to_vec()),
        CodeUnit::new("classes2.dex", b"integration classes".to_vec()),
    ];
    let summary = merge(&units, &base, &patched).unwrap();
    assert_eq!((summary.written, summary.replaced, summary.copied), (2, 1, 5));

    let summary = align(&patched, &aligned).unwrap();
    assert_eq!(summary.entries, 7);
    assert_eq!(summary.page_aligned, 1);
    assert!(check_alignment(&aligned).unwrap().is_empty());

    let mut archive = ZipArchive::open(&aligned).unwrap();
    let names: Vec<String> = archive.entries().iter().map(|e| e.name.clone()).collect();
    assert_eq!(
        names,
        vec![
            "classes.dex",
            "classes2.dex",
            "AndroidManifest.xml",
            "resources.arsc",
            "lib/arm64-v8a/libnative.so",
            "res/layout/main.xml",
            "assets/odd.bin",
        ]
    );
    assert_eq!(archive.read_by_name("classes.dex").unwrap(), b"patched classes");
    assert_eq!(
        archive.read_by_name("lib/arm64-v8a/libnative.so").unwrap(),
        generate_test_data(9001)
    );
}

#[test]
fn test_align_twice_is_byte_identical() {
    let dir = temp_dir();
    let base = create_test_file(dir.path(), "base.apk", &sample_package());
    let once = dir.path().join("once.apk");
    let twice = dir.path().join("twice.apk");

    align(&base, &once).unwrap();
    align(&once, &twice).unwrap();

    assert_eq!(std::fs::read(&once).unwrap(), std::fs::read(&twice).unwrap());
}

#[test]
fn test_misaligned_entries_are_reported() {
    let dir = temp_dir();
    let base = create_test_file(dir.path(), "base.apk", &sample_package());
    let misaligned = check_alignment(&base).unwrap();
    assert!(!misaligned.is_empty());
    for entry in &misaligned {
        assert_ne!(entry.offset % entry.alignment, 0);
    }
}

#[test]
fn test_corrupt_entry_data_is_detected() {
    let mut bytes = build_archive(&[Fixture::Stored("data.bin", generate_test_data(64))]);
    // Flip a byte inside the stored data (local header is 30 + 8 bytes).
    bytes[40] ^= 0xFF;

    let mut archive = ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let err = archive.read_by_name("data.bin").unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { .. }));
    assert!(err.is_corruption());
}

/// Rewrite the uncompressed size of the first central directory header
fn forge_uncompressed_size(bytes: &mut [u8], size: u32) {
    let at = bytes
        .windows(4)
        .rposition(|w| w == 0x02014B50u32.to_le_bytes())
        .unwrap();
    bytes[at + 24..at + 28].copy_from_slice(&size.to_le_bytes());
}

#[test]
fn test_forged_uncompressed_size_is_rejected() {
    let data = generate_repetitive_data(b"abcd", 100_000);
    let original = build_archive(&[Fixture::Deflated("big.bin", data)]);

    for forged in [0x7FFF_0000, 10] {
        let mut bytes = original.clone();
        forge_uncompressed_size(&mut bytes, forged);

        let mut archive = ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let err = archive.read_by_name("big.bin").unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)), "{forged}: {err}");
    }
}

#[test]
fn test_truncated_archive_is_rejected() {
    let bytes = sample_package();
    let truncated = &bytes[..bytes.len() / 2];
    let err = ZipArchive::new(std::io::Cursor::new(truncated)).unwrap_err();
    assert!(err.is_corruption());
}

#[test]
fn test_zip64_locator_is_unsupported() {
    let mut bytes = vec![0u8; 20];
    bytes[..4].copy_from_slice(&0x07064B50u32.to_le_bytes());
    bytes.extend_from_slice(&build_archive(&[]));

    let err = ZipArchive::new(std::io::Cursor::new(bytes)).unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));
}

#[test]
fn test_missing_input_is_io_error() {
    let dir = temp_dir();
    let err = align(&dir.path().join("absent.apk"), &dir.path().join("out.apk")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
