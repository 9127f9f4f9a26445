//! Cache behaviour against a fake release host

use crate::common::*;
use patch_assets::{AssetCache, Error, SourceId};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const SOURCE: &str = "revanced/revanced-integrations";

fn source() -> SourceId {
    SOURCE.parse().unwrap()
}

#[test]
fn test_fetch_latest_downloads_once() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = temp_dir();
    let transport = Arc::new(FakeTransport::default().with_release(
        SOURCE,
        "v1.2.0",
        &[
            ("integrations-1.2.0-sources.jar", b"src"),
            ("integrations-1.2.0.apk", b"apk bytes"),
        ],
    ));
    let cache = AssetCache::new(dir.path(), transport.clone());

    let first = cache.fetch_latest(&source()).unwrap();
    assert!(!first.cache_hit);
    assert_eq!(first.tag, "v1.2.0");
    assert_eq!(first.path, dir.path().join("v1.2.0-integrations-1.2.0.apk"));
    assert_eq!(std::fs::read(&first.path).unwrap(), b"apk bytes");

    let second = cache.fetch_latest(&source()).unwrap();
    assert!(second.cache_hit);
    assert_eq!(second.path, first.path);
    assert_eq!(transport.downloads(), 1);
}

#[test]
fn test_existing_file_is_trusted_without_network() {
    let dir = temp_dir();
    let transport = Arc::new(FakeTransport::default().with_release(
        SOURCE,
        "v1.2.0",
        &[("integrations-1.2.0.apk", b"fresh")],
    ));
    let cache = AssetCache::new(dir.path(), transport.clone());

    let release = cache.resolve_latest(&source()).unwrap();
    let asset = &release.assets[0];
    std::fs::write(cache.cache_path(&release, asset), b"stale but trusted").unwrap();

    let artifact = cache.fetch(&release, asset).unwrap();
    assert!(artifact.cache_hit);
    assert_eq!(std::fs::read(artifact.path).unwrap(), b"stale but trusted");
    assert_eq!(transport.downloads(), 0);
}

#[test]
fn test_concurrent_fetches_share_one_download() {
    let dir = temp_dir();
    let mut fake = FakeTransport::default().with_release(
        SOURCE,
        "v2.0.0",
        &[("integrations.apk", b"payload")],
    );
    fake.delay = Some(Duration::from_millis(50));
    let transport = Arc::new(fake);
    let cache = Arc::new(AssetCache::new(dir.path(), transport.clone()));

    let release = cache.resolve_latest(&source()).unwrap();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let release = release.clone();
            std::thread::spawn(move || cache.fetch(&release, &release.assets[0]).unwrap())
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(transport.downloads(), 1);
    assert_eq!(results.iter().filter(|r| !r.cache_hit).count(), 1);
}

#[test]
fn test_interrupted_download_leaves_no_cache_file() {
    let dir = temp_dir();
    let mut fake = FakeTransport::default().with_release(
        SOURCE,
        "v3.0.0",
        &[("integrations.apk", b"0123456789")],
    );
    fake.fail_after = Some(4);
    let cache = AssetCache::new(dir.path(), Arc::new(fake));

    let release = cache.resolve_latest(&source()).unwrap();
    let err = cache.fetch(&release, &release.assets[0]).unwrap_err();
    assert!(matches!(err, Error::Download { .. }));

    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[test]
fn test_release_without_binary_is_asset_not_found() {
    let dir = temp_dir();
    let transport = Arc::new(FakeTransport::default().with_release(
        SOURCE,
        "v4.0.0",
        &[("notes.txt", b"hi"), ("lib-javadoc.jar", b"doc")],
    ));
    let cache = AssetCache::new(dir.path(), transport);

    let err = cache.fetch_latest(&source()).unwrap_err();
    assert!(matches!(err, Error::AssetNotFound { tag } if tag == "v4.0.0"));
}

#[test]
fn test_unknown_source_is_download_error() {
    let dir = temp_dir();
    let cache = AssetCache::new(dir.path(), Arc::new(FakeTransport::default()));
    let other: SourceId = "nobody/nothing".parse().unwrap();

    let err = cache.resolve_latest(&other).unwrap_err();
    assert!(matches!(err, Error::Download { status: Some(404), .. }));
}
