//! Common test utilities and fixtures

#![allow(dead_code)]

use apk_sign::SigningIdentity;
use apk_zip::{ZipArchive, ZipWriter};
use parking_lot::Mutex;
use patch_assets::{SourceId, Transport};
use patch_bundle::{OptionValues, PatchBundle, PatchContext, PatchError, PatchRegistry, Session};
use patch_runner::{
    CancelToken, JobObserver, JobState, Orchestrator, OverlayEngineFactory, PatchJob, PatchOutcome,
};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tempfile::TempDir;

/// Create a temporary directory for tests
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// A small identity shared by all tests; key generation is slow
pub fn test_identity() -> Arc<SigningIdentity> {
    static IDENTITY: OnceLock<Arc<SigningIdentity>> = OnceLock::new();
    IDENTITY
        .get_or_init(|| {
            Arc::new(
                SigningIdentity::generate("Patchwright Test", 1024)
                    .expect("Failed to generate identity"),
            )
        })
        .clone()
}

/// Bytes of a fake dex file
pub fn dex(body: &[u8]) -> Vec<u8> {
    let mut data = b"dex\n035\0".to_vec();
    data.extend_from_slice(body);
    data
}

/// Package with one code unit, resources and a native library
pub fn base_package() -> Vec<u8> {
    let mut writer = ZipWriter::new(Vec::new());
    writer
        .add_deflated("AndroidManifest.xml", b"<manifest package=\"com.example.app\"/>")
        .unwrap();
    writer.add_deflated("classes.dex", &dex(b"base")).unwrap();
    writer
        .add_deflated("res/values/strings.xml", b"<resources/>")
        .unwrap();
    writer
        .add_stored("lib/arm64-v8a/libapp.so", &vec![0x7F; 5000])
        .unwrap();
    writer.finish(b"").unwrap()
}

/// [`base_package`] with the local header of `name` broken
///
/// The central directory still lists the entry, so the damage only shows
/// when its data is copied.
pub fn package_with_broken_header(name: &str) -> Vec<u8> {
    let mut bytes = base_package();
    let offset = {
        let archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        archive.entry(name).unwrap().local_header_offset() as usize
    };
    bytes[offset..offset + 4].copy_from_slice(b"XXXX");
    bytes
}

/// Integration archive with one code unit
pub fn integrations_package() -> Vec<u8> {
    let mut writer = ZipWriter::new(Vec::new());
    writer.add_deflated("classes.dex", &dex(b"integrations")).unwrap();
    writer.add_deflated("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n").unwrap();
    writer.finish(b"").unwrap()
}

fn mark_one(ctx: &mut dyn PatchContext, _: &OptionValues) -> Result<(), PatchError> {
    let mut code = ctx
        .code_unit("classes.dex")
        .ok_or_else(|| PatchError::MissingCodeUnit("classes.dex".to_string()))?
        .to_vec();
    code.extend_from_slice(b"+one");
    ctx.put_code_unit("classes.dex", code);
    ctx.put_resource("assets/one.txt", b"one".to_vec());
    Ok(())
}

fn half_then_fail(ctx: &mut dyn PatchContext, _: &OptionValues) -> Result<(), PatchError> {
    ctx.put_resource("assets/two.txt", b"two".to_vec());
    ctx.remove_resource("res/values/strings.xml");
    ctx.put_code_unit("classes.dex", dex(b"clobbered"));
    Err(PatchError::failed("method signature not found"))
}

fn mark_three(ctx: &mut dyn PatchContext, _: &OptionValues) -> Result<(), PatchError> {
    let strings = ctx
        .resource("res/values/strings.xml")?
        .ok_or_else(|| PatchError::MissingResource("res/values/strings.xml".to_string()))?;
    let mut edited = strings;
    edited.extend_from_slice(b"<!-- three -->");
    ctx.put_resource("res/values/strings.xml", edited);
    ctx.put_resource("assets/three.txt", b"three".to_vec());
    Ok(())
}

fn accent(ctx: &mut dyn PatchContext, options: &OptionValues) -> Result<(), PatchError> {
    let value = options.get("accent").unwrap_or_default();
    ctx.put_resource("assets/accent.txt", value.as_bytes().to_vec());
    Ok(())
}

/// Registry with the implementations of [`MANIFEST`]
pub fn registry() -> PatchRegistry {
    let mut registry = PatchRegistry::new();
    registry
        .register_patch("marker.one", mark_one)
        .register_patch("marker.fail", half_then_fail)
        .register_patch("marker.three", mark_three)
        .register_patch("theme.accent", accent);
    registry
}

/// Bundle manifest with four patches
pub const MANIFEST: &str = r#"{
    "patches": [
        {
            "id": "one",
            "name": "First",
            "implementation": "marker.one",
            "compatiblePackages": [
                {"packageName": "com.example.app", "allowedVersions": ["1.0", "1.1"]}
            ]
        },
        {"id": "two", "name": "Second", "implementation": "marker.fail"},
        {"id": "three", "name": "Third", "implementation": "marker.three"},
        {
            "id": "accent",
            "name": "Accent",
            "implementation": "theme.accent",
            "options": [{"key": "accent", "title": "Accent colour", "required": true}]
        }
    ]
}"#;

/// Session with [`MANIFEST`] loaded
pub fn session() -> Session {
    session_with(registry())
}

/// Session over `registry` with [`MANIFEST`] loaded
pub fn session_with(registry: PatchRegistry) -> Session {
    let registry = Arc::new(registry);
    let session = Session::new(Arc::clone(&registry));
    session.replace_bundle(PatchBundle::from_bytes(MANIFEST.as_bytes(), &registry).unwrap());
    session
}

/// Orchestrator with the overlay engine and the test identity
pub fn orchestrator() -> Orchestrator {
    Orchestrator::new(Arc::new(OverlayEngineFactory), test_identity())
}

/// Files of one test job
pub struct Workspace {
    pub dir: TempDir,
    pub target: PathBuf,
    pub output: PathBuf,
    pub work_root: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = temp_dir();
        let target = dir.path().join("app.apk");
        std::fs::write(&target, base_package()).unwrap();
        Self {
            output: dir.path().join("out").join("app-patched.apk"),
            work_root: dir.path().join("work"),
            target,
            dir,
        }
    }

    pub fn job<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> PatchJob {
        PatchJob::new(&self.target, &self.output)
            .with_patches(ids)
            .with_work_root(&self.work_root)
    }

    pub fn write(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Whether every scratch directory is gone
    pub fn work_root_is_empty(&self) -> bool {
        match std::fs::read_dir(&self.work_root) {
            Ok(entries) => entries.count() == 0,
            Err(_) => true,
        }
    }
}

/// Observer recording everything; optionally cancels on entering a state
#[derive(Default)]
pub struct Recorder {
    pub states: Mutex<Vec<JobState>>,
    pub outcomes: Mutex<Vec<PatchOutcome>>,
    pub cancel_on: Option<(JobState, CancelToken)>,
}

impl Recorder {
    pub fn cancelling_on(state: JobState, token: CancelToken) -> Self {
        Self {
            cancel_on: Some((state, token)),
            ..Self::default()
        }
    }

    pub fn states(&self) -> Vec<JobState> {
        self.states.lock().clone()
    }
}

impl JobObserver for Recorder {
    fn state_changed(&self, state: JobState) {
        self.states.lock().push(state);
        if let Some((trigger, token)) = &self.cancel_on {
            if *trigger == state {
                token.cancel();
            }
        }
    }

    fn patch_finished(&self, outcome: &PatchOutcome) {
        self.outcomes.lock().push(outcome.clone());
    }
}

/// Transport serving one release of one repository
pub struct ReleaseTransport {
    pub asset_name: String,
    pub body: Vec<u8>,
    pub downloads: Mutex<usize>,
}

impl Transport for ReleaseTransport {
    fn get_json(&self, url: &str) -> patch_assets::Result<serde_json::Value> {
        Ok(serde_json::json!({
            "tag_name": "v1.2.0",
            "assets": [
                {
                    "name": "integrations-1.2.0-sources.jar",
                    "browser_download_url": format!("{}/src", url)
                },
                {"name": self.asset_name, "browser_download_url": format!("{}/bin", url)}
            ]
        }))
    }

    fn download(&self, _url: &str, sink: &mut dyn Write) -> patch_assets::Result<u64> {
        *self.downloads.lock() += 1;
        sink.write_all(&self.body)?;
        Ok(self.body.len() as u64)
    }

    fn latest_release_url(&self, source: &SourceId) -> String {
        format!("fake://{}/releases/latest", source)
    }
}

/// Read an entry of an archive on disk
pub fn read_entry(path: &Path, name: &str) -> Option<Vec<u8>> {
    let mut archive = apk_zip::ZipArchive::open(path).unwrap();
    archive.entry(name)?;
    Some(archive.read_by_name(name).unwrap())
}
