//! Zip archive reader
//!
//! Reads the central directory once on open and serves raw or decompressed
//! entry data on demand.

use crate::header::{
    CentralDirectoryHeader, CompressionMethod, EndOfCentralDirectory, FLAG_ENCRYPTED,
    LocalFileHeader,
};
use crate::{Error, Result};
use flate2::read::DeflateDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Most bytes reserved up front for decompressed data; declared sizes come
/// from the archive and may be forged
const MAX_PREALLOCATION: usize = 1024 * 1024;

/// One entry as recorded in the central directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    /// Entry name (lossy UTF-8 of the raw name)
    pub name: String,
    /// Central directory header the entry was read from
    pub header: CentralDirectoryHeader,
}

impl ZipEntry {
    /// Compression method
    pub fn method(&self) -> CompressionMethod {
        self.header.method
    }

    /// Compressed size in bytes
    pub fn compressed_size(&self) -> u64 {
        self.header.compressed_size as u64
    }

    /// Uncompressed size in bytes
    pub fn uncompressed_size(&self) -> u64 {
        self.header.uncompressed_size as u64
    }

    /// CRC-32 of the uncompressed data
    pub fn crc32(&self) -> u32 {
        self.header.crc32
    }

    /// Offset of the entry's local file header
    pub fn local_header_offset(&self) -> u64 {
        self.header.local_header_offset as u64
    }

    /// Raw name bytes as stored in the archive
    pub fn raw_name(&self) -> &[u8] {
        &self.header.name
    }

    /// Whether the entry is a directory placeholder
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }
}

/// Read access to a zip archive
#[derive(Debug)]
pub struct ZipArchive<R> {
    reader: R,
    entries: Vec<ZipEntry>,
    index: HashMap<String, usize>,
    central_directory_offset: u64,
    end_record_offset: u64,
    end_record: EndOfCentralDirectory,
    file_len: u64,
}

impl ZipArchive<BufReader<File>> {
    /// Open an archive from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Opening zip archive {}", path.display());
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> ZipArchive<R> {
    /// Parse the central directory of an archive
    pub fn new(mut reader: R) -> Result<Self> {
        let (end_record_offset, end_record) = EndOfCentralDirectory::find(&mut reader)?;
        let file_len = reader.seek(SeekFrom::End(0))?;
        let central_directory_offset = end_record.central_directory_offset as u64;

        reader.seek(SeekFrom::Start(central_directory_offset))?;
        let mut entries = Vec::with_capacity(end_record.total_entries as usize);
        let mut index = HashMap::with_capacity(end_record.total_entries as usize);

        for i in 0..end_record.total_entries {
            let header = CentralDirectoryHeader::read(&mut reader).map_err(|e| match e {
                Error::Io(_) => Error::invalid_format(format!(
                    "Central directory truncated at entry {}",
                    i
                )),
                other => other,
            })?;

            if header.local_header_offset as u64 >= central_directory_offset {
                return Err(Error::invalid_format(format!(
                    "Entry {} local header offset 0x{:X} points past the entry section",
                    i, header.local_header_offset
                )));
            }

            let name = String::from_utf8_lossy(&header.name).into_owned();
            if index.insert(name.clone(), entries.len()).is_some() {
                log::warn!("Archive lists {} more than once; last entry wins lookups", name);
            }
            entries.push(ZipEntry { name, header });
        }

        log::debug!(
            "Read {} central directory entries from offset 0x{:X}",
            entries.len(),
            central_directory_offset
        );

        Ok(Self {
            reader,
            entries,
            index,
            central_directory_offset,
            end_record_offset,
            end_record,
            file_len,
        })
    }

    /// All entries in central directory order
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by name
    pub fn entry(&self, name: &str) -> Option<&ZipEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Archive comment
    pub fn comment(&self) -> &[u8] {
        &self.end_record.comment
    }

    /// Offset of the central directory
    pub fn central_directory_offset(&self) -> u64 {
        self.central_directory_offset
    }

    /// Offset of the end of central directory record
    pub fn end_record_offset(&self) -> u64 {
        self.end_record_offset
    }

    /// Read the local file header of an entry
    pub fn local_header(&mut self, entry: &ZipEntry) -> Result<LocalFileHeader> {
        self.reader.seek(SeekFrom::Start(entry.local_header_offset()))?;
        let header = LocalFileHeader::read(&mut self.reader)?;
        if header.name != entry.header.name {
            return Err(Error::invalid_format(format!(
                "Local header name does not match central directory for {}",
                entry.name
            )));
        }
        Ok(header)
    }

    /// Absolute offset of an entry's data
    pub fn data_offset(&mut self, entry: &ZipEntry) -> Result<u64> {
        let local = self.local_header(entry)?;
        let start = entry.local_header_offset() + local.encoded_len();
        let end = start + entry.compressed_size();
        if end > self.central_directory_offset.min(self.file_len) {
            return Err(Error::invalid_format(format!(
                "Data of {} (0x{:X}..0x{:X}) runs past the entry section",
                entry.name, start, end
            )));
        }
        Ok(start)
    }

    /// Reader over the entry's data exactly as stored
    pub fn raw_reader(&mut self, entry: &ZipEntry) -> Result<impl Read + '_> {
        let offset = self.data_offset(entry)?;
        self.reader.seek(SeekFrom::Start(offset))?;
        Ok((&mut self.reader).take(entry.compressed_size()))
    }

    /// Entry data exactly as stored
    pub fn read_raw(&mut self, entry: &ZipEntry) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(entry.compressed_size() as usize);
        self.raw_reader(entry)?.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Decompressed entry data, CRC-checked
    pub fn read_entry(&mut self, entry: &ZipEntry) -> Result<Vec<u8>> {
        if entry.header.flags & FLAG_ENCRYPTED != 0 {
            return Err(Error::unsupported(format!(
                "encrypted entry {}",
                entry.name
            )));
        }

        let raw = self.read_raw(entry)?;
        let data = match entry.method() {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflated => {
                let declared = entry.uncompressed_size();
                let mut out = Vec::with_capacity((declared as usize).min(MAX_PREALLOCATION));
                // One byte past the declared size is enough to report a mismatch.
                DeflateDecoder::new(raw.as_slice())
                    .take(declared + 1)
                    .read_to_end(&mut out)
                    .map_err(|e| {
                        Error::compression(format!("Failed to inflate {}: {}", entry.name, e))
                    })?;
                out
            }
            CompressionMethod::Other(method) => {
                return Err(Error::unsupported(format!(
                    "compression method {} for {}",
                    method, entry.name
                )));
            }
        };

        if data.len() as u64 != entry.uncompressed_size() {
            return Err(Error::invalid_format(format!(
                "{} decompressed to {} bytes, expected {}",
                entry.name,
                data.len(),
                entry.uncompressed_size()
            )));
        }

        let actual = crc32fast::hash(&data);
        if actual != entry.crc32() {
            return Err(Error::ChecksumMismatch {
                entry: entry.name.clone(),
                expected: entry.crc32(),
                actual,
            });
        }
        Ok(data)
    }

    /// Decompressed data of the named entry
    pub fn read_by_name(&mut self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .entry(name)
            .cloned()
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
        self.read_entry(&entry)
    }

    /// Consume the archive and return the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}
