//! End-to-end patch jobs through the overlay engine

use crate::common::*;
use patch_assets::AssetCache;
use patch_bundle::{OptionValues, Patch, PatchContext, PatchError};
use patch_runner::{CancelToken, IntegrationSource, JobError, JobState};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Barrier};

#[test]
fn test_failing_patch_is_recorded_and_skipped() {
    let _ = env_logger::builder().is_test(true).try_init();
    let ws = Workspace::new();
    let session = session();
    let recorder = Recorder::default();

    let report = orchestrator()
        .run(&ws.job(["one", "two", "three"]), &session, &recorder, &CancelToken::new())
        .unwrap();

    let summary: Vec<_> = report
        .outcomes
        .iter()
        .map(|o| (o.id.as_str(), o.is_success()))
        .collect();
    assert_eq!(summary, vec![("one", true), ("two", false), ("three", true)]);
    assert_eq!(
        report.outcomes[1].error,
        Some(PatchError::failed("method signature not found"))
    );
    assert_eq!(*recorder.outcomes.lock(), report.outcomes);
    assert_eq!(
        recorder.states(),
        vec![
            JobState::LoadingBundle,
            JobState::Resolving,
            JobState::PreparingWorkdir,
            JobState::Applying,
            JobState::Saving,
            JobState::Repackaging,
            JobState::Signing,
            JobState::Done,
        ]
    );

    // Effects of the first and third patch only
    let output = &report.output;
    apk_sign::verify(output).unwrap();
    assert!(apk_zip::check_alignment(output).unwrap().is_empty());
    assert_eq!(read_entry(output, "classes.dex").unwrap(), dex(b"base+one"));
    assert_eq!(read_entry(output, "assets/one.txt").unwrap(), b"one");
    assert_eq!(read_entry(output, "assets/three.txt").unwrap(), b"three");
    assert_eq!(read_entry(output, "assets/two.txt"), None);
    assert_eq!(
        read_entry(output, "res/values/strings.xml").unwrap(),
        b"<resources/><!-- three -->"
    );
    assert_eq!(
        read_entry(output, "lib/arm64-v8a/libapp.so").unwrap(),
        vec![0x7F; 5000]
    );
    assert!(ws.work_root_is_empty());
}

#[test]
fn test_patches_run_in_bundle_order() {
    let ws = Workspace::new();
    let report = orchestrator()
        .run(&ws.job(["three", "one"]), &session(), &(), &CancelToken::new())
        .unwrap();

    let ids: Vec<_> = report.outcomes.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, ["one", "three"]);
    assert_eq!(report.succeeded(), 2);
}

#[test]
fn test_no_matching_patch_fails_while_resolving() {
    let ws = Workspace::new();
    let recorder = Recorder::default();

    let failure = orchestrator()
        .run(&ws.job(["missing"]), &session(), &recorder, &CancelToken::new())
        .unwrap_err();

    assert_eq!(failure.state, JobState::Resolving);
    assert!(matches!(failure.error, JobError::NoPatchesSelected));
    assert_eq!(recorder.states().last(), Some(&JobState::Failed));
    assert!(!ws.output.exists());
}

#[test]
fn test_broken_resource_fails_job_while_saving() {
    let ws = Workspace::new();
    std::fs::write(&ws.target, package_with_broken_header("lib/arm64-v8a/libapp.so")).unwrap();
    let recorder = Recorder::default();

    let failure = orchestrator()
        .run(&ws.job(["one"]), &session(), &recorder, &CancelToken::new())
        .unwrap_err();

    assert_eq!(failure.state, JobState::Saving);
    assert!(matches!(failure.error, JobError::Engine(_)));
    assert!(failure.error.is_fatal());
    assert_eq!(
        recorder.states(),
        vec![
            JobState::LoadingBundle,
            JobState::Resolving,
            JobState::PreparingWorkdir,
            JobState::Applying,
            JobState::Saving,
            JobState::Failed,
        ]
    );
    assert_eq!(recorder.outcomes.lock().len(), 1);
    assert!(!ws.output.exists());
    assert!(ws.work_root_is_empty());
}

#[test]
fn test_cancelled_job_publishes_nothing() {
    let ws = Workspace::new();
    let cancel = CancelToken::new();
    let recorder = Recorder::cancelling_on(JobState::Applying, cancel.clone());

    let failure = orchestrator()
        .run(&ws.job(["one", "three"]), &session(), &recorder, &cancel)
        .unwrap_err();

    assert!(failure.error.is_cancelled());
    assert_eq!(failure.state, JobState::Applying);
    assert!(recorder.outcomes.lock().is_empty());
    assert!(!ws.output.exists());
    assert!(ws.work_root_is_empty());
}

#[test]
fn test_cancel_during_signing_publishes_nothing() {
    let ws = Workspace::new();
    let cancel = CancelToken::new();
    let recorder = Recorder::cancelling_on(JobState::Signing, cancel.clone());

    let failure = orchestrator()
        .run(&ws.job(["one"]), &session(), &recorder, &cancel)
        .unwrap_err();

    assert_eq!(failure.state, JobState::Signing);
    assert!(failure.error.is_cancelled());
    assert!(!ws.output.exists());
    assert!(ws.work_root_is_empty());
}

#[test]
fn test_failed_bundle_load_keeps_previous_bundle() {
    let ws = Workspace::new();
    let session = session();
    let broken = ws.write("broken.json", b"{\"patches\": [");

    let failure = orchestrator()
        .run(
            &ws.job(["one"]).with_bundle(&broken),
            &session,
            &(),
            &CancelToken::new(),
        )
        .unwrap_err();

    assert_eq!(failure.state, JobState::LoadingBundle);
    assert!(matches!(failure.error, JobError::BundleLoad(_)));
    assert_eq!(session.bundle().len(), 4);
}

#[test]
fn test_job_loads_its_bundle() {
    let ws = Workspace::new();
    let session = patch_bundle::Session::new(Arc::new(registry()));
    let bundle = ws.write("patches.json", MANIFEST.as_bytes());

    let report = orchestrator()
        .run(
            &ws.job(["three"]).with_bundle(&bundle),
            &session,
            &(),
            &CancelToken::new(),
        )
        .unwrap();

    assert_eq!(report.succeeded(), 1);
    assert_eq!(session.bundle().source(), Some(bundle.as_path()));
}

#[test]
fn test_required_option_fails_only_that_patch() {
    let ws = Workspace::new();
    let mut session = session();

    let report = orchestrator()
        .run(&ws.job(["one", "accent"]), &session, &(), &CancelToken::new())
        .unwrap();
    assert!(report.outcomes[0].is_success());
    assert!(matches!(
        &report.outcomes[1].error,
        Some(PatchError::InvalidOption { key, .. }) if key == "accent"
    ));

    session.set_option("accent", "accent", "#00ff00").unwrap();
    let report = orchestrator()
        .run(&ws.job(["accent"]), &session, &(), &CancelToken::new())
        .unwrap();
    assert!(report.outcomes[0].is_success());
    assert_eq!(
        read_entry(&report.output, "assets/accent.txt").unwrap(),
        b"#00ff00"
    );
}

#[test]
fn test_local_integrations_become_next_code_unit() {
    let ws = Workspace::new();
    let integrations = ws.write("integrations.apk", &integrations_package());

    let report = orchestrator()
        .run(
            &ws.job(["one"])
                .with_integrations(IntegrationSource::File(integrations.clone())),
            &session(),
            &(),
            &CancelToken::new(),
        )
        .unwrap();

    assert_eq!(report.integrations, Some(integrations));
    assert_eq!(read_entry(&report.output, "classes.dex").unwrap(), dex(b"base+one"));
    assert_eq!(
        read_entry(&report.output, "classes2.dex").unwrap(),
        dex(b"integrations")
    );
}

#[test]
fn test_release_integrations_are_fetched_once() {
    let ws = Workspace::new();
    let transport = Arc::new(ReleaseTransport {
        asset_name: "integrations-1.2.0.apk".to_string(),
        body: integrations_package(),
        downloads: Default::default(),
    });
    let cache = Arc::new(AssetCache::new(ws.dir.path().join("cache"), transport.clone()));
    let orchestrator = orchestrator().with_asset_cache(cache);
    let source = IntegrationSource::Release("revanced/revanced-integrations".parse().unwrap());

    for _ in 0..2 {
        let report = orchestrator
            .run(
                &ws.job(["one"]).with_integrations(source.clone()),
                &session(),
                &(),
                &CancelToken::new(),
            )
            .unwrap();
        assert!(read_entry(&report.output, "classes2.dex").is_some());
    }
    assert_eq!(*transport.downloads.lock(), 1);
}

#[test]
fn test_release_integrations_need_a_cache() {
    let ws = Workspace::new();
    let source = IntegrationSource::Release("owner/repo".parse().unwrap());

    let failure = orchestrator()
        .run(
            &ws.job(["one"]).with_integrations(source),
            &session(),
            &(),
            &CancelToken::new(),
        )
        .unwrap_err();

    assert_eq!(failure.state, JobState::Resolving);
    assert!(matches!(failure.error, JobError::NoAssetCache));
}

#[test]
fn test_missing_target_is_fatal() {
    let ws = Workspace::new();
    std::fs::remove_file(&ws.target).unwrap();

    let failure = orchestrator()
        .run(&ws.job(["one"]), &session(), &(), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(failure.error, JobError::TargetNotFound(_)));
    assert!(ws.work_root_is_empty());
}

struct Gate {
    entered: Arc<Barrier>,
    release: Arc<Barrier>,
}

impl Patch for Gate {
    fn apply(&self, _: &mut dyn PatchContext, _: &OptionValues) -> Result<(), PatchError> {
        self.entered.wait();
        self.release.wait();
        Ok(())
    }
}

#[test]
fn test_second_job_is_rejected_while_busy() {
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let mut registry = registry();
    let gate = Gate {
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
    };
    // Replaces the fixture's implementation
    registry.register_patch("marker.one", gate);
    let session = session_with(registry);
    let orchestrator = orchestrator();
    let ws = Workspace::new();
    let job = ws.job(["one"]);

    std::thread::scope(|scope| {
        let running = scope.spawn(|| orchestrator.run(&job, &session, &(), &CancelToken::new()));

        entered.wait();
        assert!(orchestrator.is_busy());
        let failure = orchestrator
            .run(&job, &session, &(), &CancelToken::new())
            .unwrap_err();
        assert_eq!(failure.state, JobState::Idle);
        assert!(matches!(failure.error, JobError::Busy));
        release.wait();

        assert!(running.join().unwrap().is_ok());
    });
    assert!(!orchestrator.is_busy());
}
