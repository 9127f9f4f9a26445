//! Bundle listing and compatibility resolution

use anyhow::{Context, Result};
use patch_bundle::{PatchBundle, PatchDescriptor, dedup_by_id, resolve};

use crate::builtin;
use crate::cli::PatchesArgs;
use crate::utils::{add_table_row, create_table, format_flag};

pub fn execute(args: PatchesArgs) -> Result<()> {
    let registry = builtin::registry();
    let bundle = PatchBundle::load(&args.bundle, &registry)
        .with_context(|| format!("Failed to load bundle {}", args.bundle.display()))?;

    if bundle.is_empty() {
        println!("Bundle contains no patches");
        return Ok(());
    }

    match (&args.package, &args.package_version) {
        (Some(package), Some(version)) => {
            let resolved = dedup_by_id(resolve(&bundle, package, version));
            if resolved.is_empty() {
                println!("No patches apply to {} {}", package, version);
                return Ok(());
            }

            let mut table = create_table(vec!["ID", "Name", "Supported", "Options"]);
            for entry in &resolved {
                add_table_row(
                    &mut table,
                    vec![
                        entry.descriptor.id.clone(),
                        entry.descriptor.name.clone(),
                        format_flag(!entry.unsupported),
                        format_flag(entry.has_options),
                    ],
                );
            }
            table.printstd();
            println!(
                "{} of {} patches apply to {} {}",
                resolved.len(),
                bundle.len(),
                package,
                version
            );
        }
        _ => {
            let mut table = create_table(vec!["ID", "Name", "Version", "Packages"]);
            for descriptor in bundle.descriptors() {
                add_table_row(
                    &mut table,
                    vec![
                        descriptor.id.clone(),
                        descriptor.name.clone(),
                        descriptor.version.clone(),
                        packages(descriptor),
                    ],
                );
            }
            table.printstd();
        }
    }

    if args.long {
        print_options(bundle.descriptors());
    }
    Ok(())
}

fn packages(descriptor: &PatchDescriptor) -> String {
    if descriptor.is_universal() {
        return "any".to_string();
    }
    descriptor
        .compatible_packages
        .iter()
        .map(|p| {
            if p.allowed_versions.is_empty() {
                p.package_name.clone()
            } else {
                format!("{} ({})", p.package_name, p.allowed_versions.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_options<'a>(descriptors: impl Iterator<Item = &'a PatchDescriptor>) {
    let mut table = create_table(vec!["Patch", "Option", "Default", "Required"]);
    let mut any = false;
    for descriptor in descriptors {
        for option in descriptor.options.as_deref().unwrap_or_default() {
            any = true;
            add_table_row(
                &mut table,
                vec![
                    descriptor.id.clone(),
                    option.key.clone(),
                    option.default.clone().unwrap_or_default(),
                    format_flag(option.required),
                ],
            );
        }
    }
    if any {
        println!();
        table.printstd();
    }
}
