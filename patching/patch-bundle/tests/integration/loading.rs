//! Loading bundles from disk into a session

use crate::common::*;
use patch_bundle::{Error, PatchBundle, Session, TargetPackage, load};
use pretty_assertions::assert_eq;

#[test]
fn test_load_plain_manifest() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = temp_dir();
    let path = create_test_file(dir.path(), "patches.json", MANIFEST.as_bytes());

    let descriptors = load(&path, &registry()).unwrap();
    let ids: Vec<_> = descriptors.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["remove-ads", "dark-mode"]);
    assert_eq!(descriptors[0].compatible_packages[0].allowed_versions, ["1.0", "1.1"]);
    assert!(descriptors[1].has_options());
}

#[test]
fn test_load_zipped_manifest() {
    let dir = temp_dir();
    let path = create_test_file(dir.path(), "bundle.zip", &zipped_manifest(MANIFEST));

    let bundle = PatchBundle::load(&path, &registry()).unwrap();
    assert_eq!(bundle.len(), 2);
    assert_eq!(bundle.source(), Some(path.as_path()));
    assert!(bundle.get("dark-mode").is_some());
}

#[test]
fn test_zip_without_manifest() {
    let mut writer = apk_zip::ZipWriter::new(Vec::new());
    writer.add_stored("readme.txt", b"nothing here").unwrap();
    let bytes = writer.finish(b"").unwrap();

    let err = PatchBundle::from_bytes(&bytes, &registry()).unwrap_err();
    assert!(matches!(err, Error::MissingManifest(_)));
}

#[test]
fn test_malformed_bundles_are_rejected() {
    let registry = registry();

    let err = PatchBundle::from_bytes(b"{ not json", &registry).unwrap_err();
    assert!(matches!(err, Error::Manifest(_)));

    let duplicate = r#"{"patches": [
        {"id": "a", "name": "A", "implementation": "ads.remove"},
        {"id": "a", "name": "A again", "implementation": "theme.dark"}
    ]}"#;
    let err = PatchBundle::from_bytes(duplicate.as_bytes(), &registry).unwrap_err();
    assert!(matches!(err, Error::DuplicatePatch(id) if id == "a"));

    let unknown = r#"{"patches": [{"id": "a", "name": "A", "implementation": "missing"}]}"#;
    let err = PatchBundle::from_bytes(unknown.as_bytes(), &registry).unwrap_err();
    assert!(matches!(err, Error::UnknownImplementation { .. }));

    let no_id = r#"{"patches": [{"id": " ", "name": "A", "implementation": "ads.remove"}]}"#;
    let err = PatchBundle::from_bytes(no_id.as_bytes(), &registry).unwrap_err();
    assert!(matches!(err, Error::InvalidDescriptor { .. }));
}

#[test]
fn test_failed_reload_keeps_previous_bundle() {
    let dir = temp_dir();
    let good = create_test_file(dir.path(), "good.json", MANIFEST.as_bytes());
    let bad = create_test_file(dir.path(), "bad.json", b"[]");
    let session = Session::new(registry());

    session.load_bundle(&good).unwrap();
    assert!(session.load_bundle(&bad).is_err());
    assert!(session.load_bundle(&dir.path().join("missing.json")).is_err());

    assert_eq!(session.bundle().len(), 2);
    assert_eq!(session.bundle().source(), Some(good.as_path()));
}

#[test]
fn test_snapshot_survives_reload() {
    let dir = temp_dir();
    let good = create_test_file(dir.path(), "good.json", MANIFEST.as_bytes());
    let single = create_test_file(
        dir.path(),
        "single.json",
        br#"{"patches": [{"id": "x", "name": "X", "implementation": "ads.remove"}]}"#,
    );
    let session = Session::new(registry());
    session.load_bundle(&good).unwrap();

    let snapshot = session.bundle();
    session.load_bundle(&single).unwrap();

    assert_eq!(snapshot.len(), 2);
    assert_eq!(session.bundle().len(), 1);
}

#[test]
fn test_resolve_through_session() {
    let dir = temp_dir();
    let path = create_test_file(dir.path(), "patches.json", MANIFEST.as_bytes());
    let mut session = Session::new(registry());
    session.load_bundle(&path).unwrap();

    session.set_target(TargetPackage::new("com.example.app", "2.0"));
    let resolved = session.resolve();
    let summary: Vec<_> = resolved
        .iter()
        .map(|r| (r.descriptor.id.as_str(), r.unsupported, r.has_options))
        .collect();
    assert_eq!(
        summary,
        vec![("remove-ads", true, false), ("dark-mode", false, true)]
    );
}
