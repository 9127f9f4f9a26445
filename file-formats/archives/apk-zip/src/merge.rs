//! Merging generated code units into a base archive

use crate::Result;
use crate::archive::ZipArchive;
use crate::writer::ZipWriter;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;

/// A named blob produced by the patching engine, typically a `classesN.dex`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUnit {
    /// Entry name inside the archive
    pub name: String,
    /// Uncompressed contents
    pub data: Vec<u8>,
}

impl CodeUnit {
    /// Create a code unit
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Counts from a merge run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Code units written
    pub written: usize,
    /// Source entries superseded by a code unit of the same name
    pub replaced: usize,
    /// Source entries copied unchanged
    pub copied: usize,
    /// Stale v1 signature files left out
    pub dropped: usize,
}

/// Whether `name` belongs to a JAR (v1) signature
///
/// These describe the original archive and are invalid once it is rewritten.
pub fn is_v1_signature_file(name: &str) -> bool {
    let Some(file) = name.strip_prefix("META-INF/") else {
        return false;
    };
    if file.contains('/') {
        return false;
    }
    let upper = file.to_ascii_uppercase();
    upper == "MANIFEST.MF"
        || [".SF", ".RSA", ".DSA", ".EC"]
            .iter()
            .any(|ext| upper.ends_with(ext))
}

/// Merge code units with the entries of `source`, writing to `output`
///
/// Code units come first, deflated. Every source entry whose name is not
/// taken by a code unit follows, copied raw in its original order. v1
/// signature files of the source are dropped.
pub fn merge(code_units: &[CodeUnit], source: &Path, output: &Path) -> Result<MergeSummary> {
    log::info!(
        "Merging {} code units into {} -> {}",
        code_units.len(),
        source.display(),
        output.display()
    );
    let mut archive = ZipArchive::open(source)?;
    let out = BufWriter::new(File::create(output)?);
    let (summary, mut out) = merge_archive(code_units, &mut archive, out)?;
    out.flush()?;
    Ok(summary)
}

/// Merge into any writer, returning it after the archive is finished
pub fn merge_archive<R: Read + Seek, W: Write>(
    code_units: &[CodeUnit],
    source: &mut ZipArchive<R>,
    output: W,
) -> Result<(MergeSummary, W)> {
    // A name given twice keeps its first position and its last contents.
    let mut order: Vec<&str> = Vec::new();
    let mut latest: HashMap<&str, &[u8]> = HashMap::new();
    for unit in code_units {
        if latest.insert(unit.name.as_str(), unit.data.as_slice()).is_none() {
            order.push(unit.name.as_str());
        } else {
            log::debug!("Code unit {} given more than once, keeping the last", unit.name);
        }
    }

    let mut writer = ZipWriter::new(output);
    let mut summary = MergeSummary::default();

    for name in &order {
        writer.add_deflated(name, latest[name])?;
        summary.written += 1;
    }

    let generated: HashSet<&str> = order.iter().copied().collect();
    let entries = source.entries().to_vec();
    for entry in &entries {
        if generated.contains(entry.name.as_str()) {
            log::debug!("Replacing {} with generated code unit", entry.name);
            summary.replaced += 1;
            continue;
        }
        if is_v1_signature_file(&entry.name) {
            log::debug!("Dropping stale signature file {}", entry.name);
            summary.dropped += 1;
            continue;
        }
        writer.copy_raw(source, entry, None)?;
        summary.copied += 1;
    }

    let comment = source.comment().to_vec();
    let output = writer.finish(&comment)?;

    log::debug!(
        "Merge wrote {} code units, replaced {}, copied {}, dropped {}",
        summary.written,
        summary.replaced,
        summary.copied,
        summary.dropped
    );
    Ok((summary, output))
}
