//! Zip archive writer
//!
//! Entries are written sequentially; the central directory is emitted by
//! [`ZipWriter::finish`]. Copied entries keep their compressed bytes and
//! metadata, only the local extra field may change to carry alignment padding.

use crate::archive::{ZipArchive, ZipEntry};
use crate::header::{
    CentralDirectoryHeader, CompressionMethod, EndOfCentralDirectory, FLAG_DATA_DESCRIPTOR,
    LocalFileHeader, aligned_extra,
};
use crate::{Error, Result};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::collections::HashSet;
use std::io::{self, Read, Seek, Write};

/// MS-DOS date for 1980-01-01, used for entries written from memory
const FIXED_DOS_DATE: u16 = 0x0021;
const FIXED_DOS_TIME: u16 = 0;

/// Version needed to extract deflated/stored entries (2.0)
const VERSION_DEFAULT: u16 = 20;

/// Writer that tracks how many bytes have been written
struct CountingWriter<W> {
    inner: W,
    position: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Sequential zip writer
pub struct ZipWriter<W: Write> {
    out: CountingWriter<W>,
    central: Vec<CentralDirectoryHeader>,
    names: HashSet<Vec<u8>>,
}

impl<W: Write> ZipWriter<W> {
    /// Start a new archive
    pub fn new(inner: W) -> Self {
        Self {
            out: CountingWriter { inner, position: 0 },
            central: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Current write offset
    pub fn position(&self) -> u64 {
        self.out.position
    }

    /// Number of entries written so far
    pub fn len(&self) -> usize {
        self.central.len()
    }

    /// Whether nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.central.is_empty()
    }

    /// Add an entry compressed with raw deflate
    pub fn add_deflated(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(data)
            .map_err(|e| Error::compression(format!("Failed to deflate {}: {}", name, e)))?;
        let compressed = encoder
            .finish()
            .map_err(|e| Error::compression(format!("Failed to deflate {}: {}", name, e)))?;
        self.add_encoded(name, CompressionMethod::Deflated, data, &compressed)
    }

    /// Add an entry without compression
    pub fn add_stored(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.add_encoded(name, CompressionMethod::Stored, data, data)
    }

    fn add_encoded(
        &mut self,
        name: &str,
        method: CompressionMethod,
        data: &[u8],
        encoded: &[u8],
    ) -> Result<()> {
        let raw_name = name.as_bytes().to_vec();
        self.claim_name(&raw_name, name)?;

        let offset = self.entry_offset()?;
        let crc32 = crc32fast::hash(data);
        let compressed_size = checked_u32(encoded.len() as u64, name)?;
        let uncompressed_size = checked_u32(data.len() as u64, name)?;

        let local = LocalFileHeader {
            version_needed: VERSION_DEFAULT,
            flags: 0,
            method,
            mod_time: FIXED_DOS_TIME,
            mod_date: FIXED_DOS_DATE,
            crc32,
            compressed_size,
            uncompressed_size,
            name: raw_name.clone(),
            extra: Vec::new(),
        };
        local.write(&mut self.out)?;
        self.out.write_all(encoded)?;

        self.central.push(CentralDirectoryHeader {
            version_made_by: VERSION_DEFAULT,
            version_needed: VERSION_DEFAULT,
            flags: 0,
            method,
            mod_time: FIXED_DOS_TIME,
            mod_date: FIXED_DOS_DATE,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_start: 0,
            internal_attributes: 0,
            external_attributes: 0,
            local_header_offset: offset,
            name: raw_name,
            extra: Vec::new(),
            comment: Vec::new(),
        });

        log::trace!("Wrote {} ({} -> {} bytes)", name, data.len(), encoded.len());
        Ok(())
    }

    /// Copy an entry from another archive without recompressing it
    ///
    /// With `alignment` set, the local extra field is rebuilt so the entry data
    /// starts on that boundary. Without it, the local extra field is kept
    /// as-is. The central directory record (including its extra field) is
    /// always carried over unchanged apart from the new offset.
    pub fn copy_raw<R: Read + Seek>(
        &mut self,
        source: &mut ZipArchive<R>,
        entry: &ZipEntry,
        alignment: Option<u64>,
    ) -> Result<()> {
        self.claim_name(&entry.header.name, &entry.name)?;

        let source_local = source.local_header(entry)?;
        let offset = self.entry_offset()?;

        let extra = match alignment {
            Some(alignment) => aligned_extra(
                &source_local.extra,
                offset as u64,
                entry.header.name.len(),
                alignment,
            ),
            None => source_local.extra,
        };

        // Sizes and CRC come from the central directory, so a trailing data
        // descriptor is never needed.
        let flags = entry.header.flags & !FLAG_DATA_DESCRIPTOR;
        let local = LocalFileHeader {
            version_needed: entry.header.version_needed,
            flags,
            method: entry.header.method,
            mod_time: entry.header.mod_time,
            mod_date: entry.header.mod_date,
            crc32: entry.header.crc32,
            compressed_size: entry.header.compressed_size,
            uncompressed_size: entry.header.uncompressed_size,
            name: entry.header.name.clone(),
            extra,
        };
        local.write(&mut self.out)?;

        let copied = io::copy(&mut source.raw_reader(entry)?, &mut self.out)?;
        if copied != entry.compressed_size() {
            return Err(Error::invalid_format(format!(
                "{} is truncated: copied {} of {} bytes",
                entry.name,
                copied,
                entry.compressed_size()
            )));
        }

        let mut central = entry.header.clone();
        central.flags = flags;
        central.local_header_offset = offset;
        self.central.push(central);
        Ok(())
    }

    /// Write the central directory and end record, returning the inner writer
    pub fn finish(mut self, comment: &[u8]) -> Result<W> {
        let total_entries = u16::try_from(self.central.len())
            .ok()
            .filter(|&n| n != u16::MAX)
            .ok_or_else(|| Error::unsupported("more than 65534 entries"))?;

        let central_directory_offset = checked_u32(self.out.position, "central directory")?;
        for header in &self.central {
            header.write(&mut self.out)?;
        }
        let central_directory_size = checked_u32(
            self.out.position - central_directory_offset as u64,
            "central directory",
        )?;

        EndOfCentralDirectory {
            disk_number: 0,
            central_directory_disk: 0,
            disk_entries: total_entries,
            total_entries,
            central_directory_size,
            central_directory_offset,
            comment: comment.to_vec(),
        }
        .write(&mut self.out)?;

        self.out.flush()?;
        log::debug!(
            "Finished archive: {} entries, {} bytes",
            total_entries,
            self.out.position
        );
        Ok(self.out.inner)
    }

    fn claim_name(&mut self, raw_name: &[u8], name: &str) -> Result<()> {
        if !self.names.insert(raw_name.to_vec()) {
            return Err(Error::DuplicateEntry(name.to_string()));
        }
        Ok(())
    }

    fn entry_offset(&self) -> Result<u32> {
        checked_u32(self.out.position, "entry offset")
    }
}

fn checked_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|&v| v != u32::MAX)
        .ok_or_else(|| Error::unsupported(format!("{} beyond 4 GiB ({})", what, value)))
}
