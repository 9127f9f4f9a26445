//! Full patch job

use anyhow::{Context, Result, bail};
use console::style;
use indicatif::ProgressBar;
use patch_bundle::{Session, TargetPackage};
use patch_runner::{
    CancelToken, IntegrationSource, JobObserver, JobState, Orchestrator, OverlayEngineFactory,
    PatchJob, PatchOutcome,
};
use std::sync::Arc;

use crate::builtin;
use crate::cli::PatchArgs;
use crate::commands::fetch::asset_cache;
use crate::commands::signing_identity;
use crate::config::Config;
use crate::utils::{add_table_row, create_spinner, create_table, format_bytes};

/// Shows job progress on a spinner
struct SpinnerObserver {
    spinner: ProgressBar,
}

impl JobObserver for SpinnerObserver {
    fn state_changed(&self, state: JobState) {
        if !state.is_terminal() {
            self.spinner.set_message(format!("{}...", capitalize(state.label())));
        }
    }

    fn patch_finished(&self, outcome: &PatchOutcome) {
        match &outcome.error {
            None => self
                .spinner
                .println(format!("{} {}", style("[success]").green(), outcome.id)),
            Some(e) => self
                .spinner
                .println(format!("{} {}: {}", style("[error]").red(), outcome.id, e)),
        }
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Split `id.key=value`; the key is the part after the last dot
fn parse_option(raw: &str) -> Result<(&str, &str, &str)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("Option '{}' is not ID.KEY=VALUE", raw))?;
    let (id, key) = name
        .rsplit_once('.')
        .filter(|(id, key)| !id.is_empty() && !key.is_empty())
        .with_context(|| format!("Option '{}' is not ID.KEY=VALUE", raw))?;
    Ok((id, key, value))
}

pub fn execute(args: PatchArgs, config: &Config) -> Result<()> {
    let mut session = Session::new(Arc::new(builtin::registry()));
    session
        .load_bundle(&args.bundle)
        .with_context(|| format!("Failed to load bundle {}", args.bundle.display()))?;

    if let (Some(package), Some(version)) = (&args.package, &args.package_version) {
        session.set_target(TargetPackage::new(package.as_str(), version.as_str()));
        let resolved = session.resolve();
        if args.all {
            session.select_all(&resolved, true);
        }
        for id in &args.include {
            match resolved.iter().find(|r| &r.descriptor.id == id) {
                Some(entry) if entry.unsupported => {
                    log::warn!("{} is not known to work with {} {}", id, package, version)
                }
                Some(_) => {}
                None => log::warn!("{} does not apply to {}", id, package),
            }
        }
    }
    for id in &args.include {
        session.select(id, true);
    }
    if !session.any_selected() {
        bail!("No patches selected; use --include or --all");
    }

    for raw in &args.options {
        let (id, key, value) = parse_option(raw)?;
        session
            .set_option(id, key, value)
            .with_context(|| format!("Cannot set option '{}'", raw))?;
    }

    let identity = signing_identity(config)?;
    let mut orchestrator = Orchestrator::new(Arc::new(OverlayEngineFactory), Arc::new(identity));

    let integrations = if let Some(path) = &args.integrations {
        IntegrationSource::File(path.clone())
    } else if args.fetch_integrations {
        orchestrator = orchestrator.with_asset_cache(Arc::new(asset_cache(config)?));
        IntegrationSource::Release(
            config
                .integrations_source
                .parse()
                .context("Invalid integrations source in configuration")?,
        )
    } else {
        IntegrationSource::None
    };

    let job = PatchJob::new(&args.input, &args.output)
        .with_patches(session.selected_ids())
        .with_integrations(integrations)
        .with_work_root(config.work_dir());

    let observer = SpinnerObserver {
        spinner: create_spinner("Starting..."),
    };
    let result = orchestrator.run(&job, &session, &observer, &CancelToken::new());
    observer.spinner.finish_and_clear();
    let report = result.context("Patch job failed")?;

    let mut table = create_table(vec!["Patch", "Result"]);
    for outcome in &report.outcomes {
        let result = match &outcome.error {
            None => "applied".to_string(),
            Some(e) => format!("failed: {}", e),
        };
        add_table_row(&mut table, vec![outcome.id.clone(), result]);
    }
    table.printstd();

    let size = std::fs::metadata(report.output())
        .map(|m| m.len())
        .unwrap_or_default();
    println!(
        "{}/{} patches applied; wrote {} ({})",
        report.succeeded(),
        report.outcomes.len(),
        report.output().display(),
        format_bytes(size)
    );
    Ok(())
}
