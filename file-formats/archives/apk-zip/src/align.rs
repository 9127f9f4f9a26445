//! zipalign-compatible data alignment
//!
//! Uncompressed native libraries are aligned to page boundaries so they can be
//! mapped directly; every other entry is aligned to 4 bytes. Padding is carried
//! in a `0xD935` extra record of the local header, so entry data and order
//! never change.

use crate::Result;
use crate::archive::{ZipArchive, ZipEntry};
use crate::header::CompressionMethod;
use crate::writer::ZipWriter;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;

/// Alignment for uncompressed shared libraries
pub const PAGE_ALIGNMENT: u64 = 4096;

/// Alignment for everything else
pub const DEFAULT_ALIGNMENT: u64 = 4;

/// Boundary an entry's data must start on
pub fn entry_alignment(entry: &ZipEntry) -> u64 {
    if entry.method() == CompressionMethod::Stored
        && entry.name.starts_with("lib/")
        && entry.name.ends_with(".so")
    {
        PAGE_ALIGNMENT
    } else {
        DEFAULT_ALIGNMENT
    }
}

/// Counts from an align run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignSummary {
    /// Entries written
    pub entries: usize,
    /// Entries placed on a page boundary
    pub page_aligned: usize,
}

/// An entry whose data does not start on its required boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Misalignment {
    /// Entry name
    pub name: String,
    /// Absolute data offset
    pub offset: u64,
    /// Required boundary
    pub alignment: u64,
}

/// Align `input` into `output`
pub fn align(input: &Path, output: &Path) -> Result<AlignSummary> {
    log::info!("Aligning {} -> {}", input.display(), output.display());
    let mut archive = ZipArchive::open(input)?;
    let out = BufWriter::new(File::create(output)?);
    let (summary, mut out) = align_archive(&mut archive, out)?;
    out.flush()?;
    Ok(summary)
}

/// Align an open archive into any writer
///
/// Entries are written in central directory order, which makes the output of
/// aligning an already aligned archive identical to its input layout.
pub fn align_archive<R: Read + Seek, W: Write>(
    source: &mut ZipArchive<R>,
    output: W,
) -> Result<(AlignSummary, W)> {
    let mut writer = ZipWriter::new(output);
    let mut summary = AlignSummary::default();

    let entries = source.entries().to_vec();
    for entry in &entries {
        let alignment = entry_alignment(entry);
        writer.copy_raw(source, entry, Some(alignment))?;
        summary.entries += 1;
        if alignment == PAGE_ALIGNMENT {
            log::trace!("Page-aligned {}", entry.name);
            summary.page_aligned += 1;
        }
    }

    let comment = source.comment().to_vec();
    let output = writer.finish(&comment)?;
    log::debug!(
        "Aligned {} entries ({} page-aligned)",
        summary.entries,
        summary.page_aligned
    );
    Ok((summary, output))
}

/// List entries whose data is not on the required boundary
pub fn check_alignment(path: &Path) -> Result<Vec<Misalignment>> {
    let mut archive = ZipArchive::open(path)?;
    check_archive_alignment(&mut archive)
}

/// Alignment check over an open archive
pub fn check_archive_alignment<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Vec<Misalignment>> {
    let entries = archive.entries().to_vec();
    let mut misaligned = Vec::new();
    for entry in &entries {
        let alignment = entry_alignment(entry);
        let offset = archive.data_offset(entry)?;
        if offset % alignment != 0 {
            misaligned.push(Misalignment {
                name: entry.name.clone(),
                offset,
                alignment,
            });
        }
    }
    Ok(misaligned)
}
