//! Signing and verification of whole archives

use crate::common::*;
use apk_sign::{Error, sign, sign_bytes, verify, verify_bytes};
use apk_zip::{ZipArchive, align, check_alignment};
use pretty_assertions::assert_eq;
use std::io::Cursor;

#[test]
fn test_signed_archive_verifies() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = temp_dir();
    let input = dir.path().join("aligned.apk");
    let output = dir.path().join("signed.apk");
    std::fs::write(&input, sample_package()).unwrap();

    sign(&input, &output, test_identity()).unwrap();
    let signer = verify(&output).unwrap();

    assert_eq!(
        signer.certificate.subject_common_name(),
        Some("Patchwright Test")
    );
    assert_eq!(signer.certificate, *test_identity().certificate());
}

#[test]
fn test_signed_archive_is_still_a_readable_zip() {
    let signed = sign_bytes(&sample_package(), test_identity()).unwrap();
    let mut archive = ZipArchive::new(Cursor::new(signed)).unwrap();
    assert_eq!(archive.len(), 3);
    assert_eq!(archive.read_by_name("classes.dex").unwrap(), vec![0x64; 4096]);
}

#[test]
fn test_signing_keeps_alignment() {
    let dir = temp_dir();
    let raw = dir.path().join("raw.apk");
    let aligned = dir.path().join("aligned.apk");
    let signed = dir.path().join("signed.apk");
    std::fs::write(&raw, sample_package()).unwrap();

    align(&raw, &aligned).unwrap();
    sign(&aligned, &signed, test_identity()).unwrap();

    assert!(check_alignment(&signed).unwrap().is_empty());
}

#[test]
fn test_tampered_entry_fails_verification() {
    let mut signed = sign_bytes(&sample_package(), test_identity()).unwrap();
    // Inside the deflated classes.dex data, well before the signing block.
    let index = signed
        .windows(11)
        .position(|w| w == b"classes.dex")
        .unwrap()
        + 14;
    signed[index] ^= 0x01;

    let err = verify_bytes(&signed).unwrap_err();
    assert!(err.is_verification_failure(), "{err}");
}

#[test]
fn test_unsigned_archive_fails_verification() {
    let err = verify_bytes(&sample_package()).unwrap_err();
    assert!(matches!(err, Error::Verification(_)));
}

#[test]
fn test_resigning_replaces_signing_block() {
    let once = sign_bytes(&sample_package(), test_identity()).unwrap();
    let twice = sign_bytes(&once, test_identity()).unwrap();

    assert_eq!(once.len(), twice.len());
    let first = verify_bytes(&once).unwrap();
    let second = verify_bytes(&twice).unwrap();
    assert_eq!(first.digest, second.digest);
}

#[test]
fn test_sign_failure_publishes_nothing() {
    let dir = temp_dir();
    let input = dir.path().join("not-a-zip.apk");
    let output = dir.path().join("signed.apk");
    std::fs::write(&input, b"definitely not a zip archive").unwrap();

    let err = sign(&input, &output, test_identity()).unwrap_err();
    assert!(matches!(err, Error::Archive(_)));
    assert!(!output.exists());
}
