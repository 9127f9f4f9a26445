//! Zip record structures and parsing
//!
//! Only the records an Android package actually uses are modelled: local file
//! headers, central directory headers and the end of central directory record.
//! ZIP64 and spanned archives are rejected.

use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};

/// Local file header signature ('PK\x03\x04')
pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034B50;

/// Central directory header signature ('PK\x01\x02')
pub const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014B50;

/// End of central directory signature ('PK\x05\x06')
pub const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06054B50;

/// ZIP64 end of central directory locator signature ('PK\x06\x07')
pub const ZIP64_LOCATOR_SIGNATURE: u32 = 0x07064B50;

/// Fixed part of a local file header
pub const LOCAL_FILE_HEADER_SIZE: u64 = 30;

/// Fixed part of a central directory header
pub const CENTRAL_DIRECTORY_HEADER_SIZE: u64 = 46;

/// Fixed part of the end of central directory record
pub const END_OF_CENTRAL_DIRECTORY_SIZE: u64 = 22;

/// General purpose flag: sizes and CRC follow the data in a data descriptor
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// General purpose flag: entry is encrypted
pub const FLAG_ENCRYPTED: u16 = 0x0001;

/// Entry compression method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Data stored as-is
    Stored,
    /// Raw deflate stream
    Deflated,
    /// Any other method, preserved but not decodable
    Other(u16),
}

impl CompressionMethod {
    /// Create from the raw method number
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflated,
            other => CompressionMethod::Other(other),
        }
    }

    /// Raw method number as written to the headers
    pub fn to_raw(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflated => 8,
            CompressionMethod::Other(raw) => raw,
        }
    }
}

/// Local file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    /// Version needed to extract
    pub version_needed: u16,
    /// General purpose bit flags
    pub flags: u16,
    /// Compression method
    pub method: CompressionMethod,
    /// MS-DOS modification time
    pub mod_time: u16,
    /// MS-DOS modification date
    pub mod_date: u16,
    /// CRC-32 of the uncompressed data (zero when a data descriptor is used)
    pub crc32: u32,
    /// Compressed size
    pub compressed_size: u32,
    /// Uncompressed size
    pub uncompressed_size: u32,
    /// Raw entry name
    pub name: Vec<u8>,
    /// Extra field bytes
    pub extra: Vec<u8>,
}

impl LocalFileHeader {
    /// Read a local file header at the current reader position
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let signature = reader.read_u32::<LittleEndian>()?;
        if signature != LOCAL_FILE_HEADER_SIGNATURE {
            return Err(Error::invalid_format(format!(
                "Invalid local file header signature: 0x{:08X}",
                signature
            )));
        }

        let version_needed = reader.read_u16::<LittleEndian>()?;
        let flags = reader.read_u16::<LittleEndian>()?;
        let method = CompressionMethod::from_raw(reader.read_u16::<LittleEndian>()?);
        let mod_time = reader.read_u16::<LittleEndian>()?;
        let mod_date = reader.read_u16::<LittleEndian>()?;
        let crc32 = reader.read_u32::<LittleEndian>()?;
        let compressed_size = reader.read_u32::<LittleEndian>()?;
        let uncompressed_size = reader.read_u32::<LittleEndian>()?;
        let name_len = reader.read_u16::<LittleEndian>()? as usize;
        let extra_len = reader.read_u16::<LittleEndian>()? as usize;

        let mut name = vec![0u8; name_len];
        reader.read_exact(&mut name)?;
        let mut extra = vec![0u8; extra_len];
        reader.read_exact(&mut extra)?;

        Ok(Self {
            version_needed,
            flags,
            method,
            mod_time,
            mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            name,
            extra,
        })
    }

    /// Write this header
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let name_len = checked_u16(self.name.len(), "entry name")?;
        let extra_len = checked_u16(self.extra.len(), "local extra field")?;

        writer.write_u32::<LittleEndian>(LOCAL_FILE_HEADER_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.version_needed)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.method.to_raw())?;
        writer.write_u16::<LittleEndian>(self.mod_time)?;
        writer.write_u16::<LittleEndian>(self.mod_date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(name_len)?;
        writer.write_u16::<LittleEndian>(extra_len)?;
        writer.write_all(&self.name)?;
        writer.write_all(&self.extra)?;
        Ok(())
    }

    /// Total encoded size of this header
    pub fn encoded_len(&self) -> u64 {
        LOCAL_FILE_HEADER_SIZE + self.name.len() as u64 + self.extra.len() as u64
    }
}

/// Central directory header, one per entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    /// Version made by
    pub version_made_by: u16,
    /// Version needed to extract
    pub version_needed: u16,
    /// General purpose bit flags
    pub flags: u16,
    /// Compression method
    pub method: CompressionMethod,
    /// MS-DOS modification time
    pub mod_time: u16,
    /// MS-DOS modification date
    pub mod_date: u16,
    /// CRC-32 of the uncompressed data
    pub crc32: u32,
    /// Compressed size
    pub compressed_size: u32,
    /// Uncompressed size
    pub uncompressed_size: u32,
    /// Disk number where the entry starts
    pub disk_start: u16,
    /// Internal file attributes
    pub internal_attributes: u16,
    /// External file attributes
    pub external_attributes: u32,
    /// Offset of the local file header
    pub local_header_offset: u32,
    /// Raw entry name
    pub name: Vec<u8>,
    /// Extra field bytes
    pub extra: Vec<u8>,
    /// Entry comment
    pub comment: Vec<u8>,
}

impl CentralDirectoryHeader {
    /// Read a central directory header at the current reader position
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let signature = reader.read_u32::<LittleEndian>()?;
        if signature != CENTRAL_DIRECTORY_SIGNATURE {
            return Err(Error::invalid_format(format!(
                "Invalid central directory signature: 0x{:08X}",
                signature
            )));
        }

        let version_made_by = reader.read_u16::<LittleEndian>()?;
        let version_needed = reader.read_u16::<LittleEndian>()?;
        let flags = reader.read_u16::<LittleEndian>()?;
        let method = CompressionMethod::from_raw(reader.read_u16::<LittleEndian>()?);
        let mod_time = reader.read_u16::<LittleEndian>()?;
        let mod_date = reader.read_u16::<LittleEndian>()?;
        let crc32 = reader.read_u32::<LittleEndian>()?;
        let compressed_size = reader.read_u32::<LittleEndian>()?;
        let uncompressed_size = reader.read_u32::<LittleEndian>()?;
        let name_len = reader.read_u16::<LittleEndian>()? as usize;
        let extra_len = reader.read_u16::<LittleEndian>()? as usize;
        let comment_len = reader.read_u16::<LittleEndian>()? as usize;
        let disk_start = reader.read_u16::<LittleEndian>()?;
        let internal_attributes = reader.read_u16::<LittleEndian>()?;
        let external_attributes = reader.read_u32::<LittleEndian>()?;
        let local_header_offset = reader.read_u32::<LittleEndian>()?;

        let mut name = vec![0u8; name_len];
        reader.read_exact(&mut name)?;
        let mut extra = vec![0u8; extra_len];
        reader.read_exact(&mut extra)?;
        let mut comment = vec![0u8; comment_len];
        reader.read_exact(&mut comment)?;

        if compressed_size == u32::MAX
            || uncompressed_size == u32::MAX
            || local_header_offset == u32::MAX
        {
            return Err(Error::unsupported("ZIP64 entries"));
        }

        Ok(Self {
            version_made_by,
            version_needed,
            flags,
            method,
            mod_time,
            mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_start,
            internal_attributes,
            external_attributes,
            local_header_offset,
            name,
            extra,
            comment,
        })
    }

    /// Write this header
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let name_len = checked_u16(self.name.len(), "entry name")?;
        let extra_len = checked_u16(self.extra.len(), "central extra field")?;
        let comment_len = checked_u16(self.comment.len(), "entry comment")?;

        writer.write_u32::<LittleEndian>(CENTRAL_DIRECTORY_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.version_made_by)?;
        writer.write_u16::<LittleEndian>(self.version_needed)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.method.to_raw())?;
        writer.write_u16::<LittleEndian>(self.mod_time)?;
        writer.write_u16::<LittleEndian>(self.mod_date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(name_len)?;
        writer.write_u16::<LittleEndian>(extra_len)?;
        writer.write_u16::<LittleEndian>(comment_len)?;
        writer.write_u16::<LittleEndian>(self.disk_start)?;
        writer.write_u16::<LittleEndian>(self.internal_attributes)?;
        writer.write_u32::<LittleEndian>(self.external_attributes)?;
        writer.write_u32::<LittleEndian>(self.local_header_offset)?;
        writer.write_all(&self.name)?;
        writer.write_all(&self.extra)?;
        writer.write_all(&self.comment)?;
        Ok(())
    }

    /// Total encoded size of this header
    pub fn encoded_len(&self) -> u64 {
        CENTRAL_DIRECTORY_HEADER_SIZE
            + self.name.len() as u64
            + self.extra.len() as u64
            + self.comment.len() as u64
    }
}

/// End of central directory record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    /// Number of this disk
    pub disk_number: u16,
    /// Disk where the central directory starts
    pub central_directory_disk: u16,
    /// Entries in the central directory on this disk
    pub disk_entries: u16,
    /// Total entries in the central directory
    pub total_entries: u16,
    /// Size of the central directory in bytes
    pub central_directory_size: u32,
    /// Offset of the central directory from the start of the archive
    pub central_directory_offset: u32,
    /// Archive comment
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    /// Locate the record by scanning backwards from the end of the archive
    ///
    /// Returns the record's absolute offset together with the parsed record.
    pub fn find<R: Read + Seek>(reader: &mut R) -> Result<(u64, Self)> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        if file_len < END_OF_CENTRAL_DIRECTORY_SIZE {
            return Err(Error::invalid_format(format!(
                "File too small to be a zip archive: {} bytes",
                file_len
            )));
        }

        // The comment is at most 65535 bytes, which bounds the search window.
        let window = file_len.min(END_OF_CENTRAL_DIRECTORY_SIZE + u16::MAX as u64);
        let window_start = file_len - window;
        reader.seek(SeekFrom::Start(window_start))?;
        let mut tail = vec![0u8; window as usize];
        reader.read_exact(&mut tail)?;

        let last_candidate = tail.len() - END_OF_CENTRAL_DIRECTORY_SIZE as usize;
        for pos in (0..=last_candidate).rev() {
            if tail[pos..pos + 4] != END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes() {
                continue;
            }
            let comment_len = u16::from_le_bytes([tail[pos + 20], tail[pos + 21]]) as usize;
            if pos + END_OF_CENTRAL_DIRECTORY_SIZE as usize + comment_len != tail.len() {
                continue;
            }

            let mut record = &tail[pos..];
            let eocd = Self::read(&mut record)?;
            let offset = window_start + pos as u64;

            if pos >= 20 && tail[pos - 20..pos - 16] == ZIP64_LOCATOR_SIGNATURE.to_le_bytes() {
                return Err(Error::unsupported("ZIP64 archives"));
            }
            eocd.validate(offset)?;

            log::trace!(
                "End of central directory at 0x{:X}: {} entries, directory at 0x{:X} ({} bytes)",
                offset,
                eocd.total_entries,
                eocd.central_directory_offset,
                eocd.central_directory_size
            );
            return Ok((offset, eocd));
        }

        Err(Error::invalid_format(
            "End of central directory record not found",
        ))
    }

    /// Read the record at the current reader position
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let signature = reader.read_u32::<LittleEndian>()?;
        if signature != END_OF_CENTRAL_DIRECTORY_SIGNATURE {
            return Err(Error::invalid_format(format!(
                "Invalid end of central directory signature: 0x{:08X}",
                signature
            )));
        }

        let disk_number = reader.read_u16::<LittleEndian>()?;
        let central_directory_disk = reader.read_u16::<LittleEndian>()?;
        let disk_entries = reader.read_u16::<LittleEndian>()?;
        let total_entries = reader.read_u16::<LittleEndian>()?;
        let central_directory_size = reader.read_u32::<LittleEndian>()?;
        let central_directory_offset = reader.read_u32::<LittleEndian>()?;
        let comment_len = reader.read_u16::<LittleEndian>()? as usize;
        let mut comment = vec![0u8; comment_len];
        reader.read_exact(&mut comment)?;

        Ok(Self {
            disk_number,
            central_directory_disk,
            disk_entries,
            total_entries,
            central_directory_size,
            central_directory_offset,
            comment,
        })
    }

    /// Write the record
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let comment_len = checked_u16(self.comment.len(), "archive comment")?;

        writer.write_u32::<LittleEndian>(END_OF_CENTRAL_DIRECTORY_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.disk_number)?;
        writer.write_u16::<LittleEndian>(self.central_directory_disk)?;
        writer.write_u16::<LittleEndian>(self.disk_entries)?;
        writer.write_u16::<LittleEndian>(self.total_entries)?;
        writer.write_u32::<LittleEndian>(self.central_directory_size)?;
        writer.write_u32::<LittleEndian>(self.central_directory_offset)?;
        writer.write_u16::<LittleEndian>(comment_len)?;
        writer.write_all(&self.comment)?;
        Ok(())
    }

    fn validate(&self, own_offset: u64) -> Result<()> {
        if self.disk_number != 0 || self.central_directory_disk != 0 {
            return Err(Error::unsupported("multi-disk archives"));
        }
        if self.disk_entries != self.total_entries {
            return Err(Error::unsupported("multi-disk archives"));
        }
        if self.central_directory_offset == u32::MAX || self.total_entries == u16::MAX {
            return Err(Error::unsupported("ZIP64 archives"));
        }

        let directory_end =
            self.central_directory_offset as u64 + self.central_directory_size as u64;
        if directory_end > own_offset {
            return Err(Error::invalid_format(format!(
                "Central directory (0x{:X}..0x{:X}) overlaps end record at 0x{:X}",
                self.central_directory_offset, directory_end, own_offset
            )));
        }
        Ok(())
    }
}

/// Extra field record id used by zipalign to carry alignment padding
pub const ALIGNMENT_EXTRA_ID: u16 = 0xD935;

/// Header size of one extra field record (id + length)
const EXTRA_RECORD_HEADER: usize = 4;

/// Minimum size of an alignment record (header + u16 alignment)
const ALIGNMENT_RECORD_MIN: usize = EXTRA_RECORD_HEADER + 2;

/// Remove any alignment records from an extra field
///
/// Returns `None` when the field is not a well-formed sequence of records.
pub fn strip_alignment_records(extra: &[u8]) -> Option<Vec<u8>> {
    let mut kept = Vec::with_capacity(extra.len());
    let mut pos = 0;

    while pos < extra.len() {
        if extra.len() - pos < EXTRA_RECORD_HEADER {
            return None;
        }
        let id = u16::from_le_bytes([extra[pos], extra[pos + 1]]);
        let len = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        let end = pos + EXTRA_RECORD_HEADER + len;
        if end > extra.len() {
            return None;
        }
        if id != ALIGNMENT_EXTRA_ID {
            kept.extend_from_slice(&extra[pos..end]);
        }
        pos = end;
    }

    Some(kept)
}

/// Build an extra field that places entry data on an `alignment` boundary
///
/// `data_start` is where the entry data would begin if `extra` were written
/// unchanged. Existing alignment records are dropped first so that repeated
/// alignment converges on the same bytes. Malformed extra fields are
/// discarded.
pub fn aligned_extra(extra: &[u8], header_offset: u64, name_len: usize, alignment: u64) -> Vec<u8> {
    let mut extra = strip_alignment_records(extra).unwrap_or_default();
    if alignment <= 1 {
        return extra;
    }

    let data_start = header_offset + LOCAL_FILE_HEADER_SIZE + name_len as u64 + extra.len() as u64;
    if data_start % alignment == 0 {
        return extra;
    }

    let after_record = data_start + ALIGNMENT_RECORD_MIN as u64;
    let padding = ((alignment - after_record % alignment) % alignment) as usize;
    let record_len = (2 + padding) as u16;

    extra.extend_from_slice(&ALIGNMENT_EXTRA_ID.to_le_bytes());
    extra.extend_from_slice(&record_len.to_le_bytes());
    extra.extend_from_slice(&(alignment as u16).to_le_bytes());
    extra.resize(extra.len() + padding, 0);
    extra
}

pub(crate) fn checked_u16(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| Error::unsupported(format!("{} longer than 65535 bytes", what)))
}
