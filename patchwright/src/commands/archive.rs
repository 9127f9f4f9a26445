//! Standalone align, sign and verify

use anyhow::{Context, Result, bail};
use std::path::Path;

use crate::cli::{AlignArgs, SignArgs, VerifyArgs};
use crate::commands::signing_identity;
use crate::config::Config;
use crate::utils::{add_table_row, create_table, format_bytes, format_fingerprint};

pub fn align(args: AlignArgs) -> Result<()> {
    if args.check {
        return check_alignment(&args.input);
    }
    let Some(output) = args.output else {
        bail!("An output path is required unless --check is given");
    };

    let summary = apk_zip::align(&args.input, &output)
        .with_context(|| format!("Failed to align {}", args.input.display()))?;
    println!(
        "Aligned {} entries ({} on page boundaries) -> {}",
        summary.entries,
        summary.page_aligned,
        output.display()
    );
    Ok(())
}

fn check_alignment(path: &Path) -> Result<()> {
    let misaligned = apk_zip::check_alignment(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if misaligned.is_empty() {
        println!("{}: all entries aligned", path.display());
        return Ok(());
    }

    let mut table = create_table(vec!["Entry", "Offset", "Boundary"]);
    for entry in &misaligned {
        add_table_row(
            &mut table,
            vec![
                entry.name.clone(),
                format!("0x{:X}", entry.offset),
                entry.alignment.to_string(),
            ],
        );
    }
    table.printstd();
    bail!("{} entries are misaligned", misaligned.len());
}

pub fn sign(args: SignArgs, config: &Config) -> Result<()> {
    let identity = signing_identity(config)?;
    apk_sign::sign(&args.input, &args.output, &identity)
        .with_context(|| format!("Failed to sign {}", args.input.display()))?;

    let size = std::fs::metadata(&args.output)
        .map(|m| m.len())
        .unwrap_or_default();
    println!("Signed {} ({})", args.output.display(), format_bytes(size));
    println!(
        "Certificate SHA-256: {}",
        format_fingerprint(&identity.certificate().sha256_fingerprint())
    );
    Ok(())
}

pub fn verify(args: VerifyArgs) -> Result<()> {
    let signer = apk_sign::verify(&args.input)
        .with_context(|| format!("Signature verification failed for {}", args.input.display()))?;
    let certificate = &signer.certificate;

    println!("Signature: valid (APK Signature Scheme v2)");
    println!(
        "Signer: {}",
        certificate.subject_common_name().unwrap_or("(no common name)")
    );
    println!(
        "Certificate SHA-256: {}",
        format_fingerprint(&certificate.sha256_fingerprint())
    );
    println!("Content digest: {}", hex::encode(signer.digest));

    check_alignment(&args.input)
}
