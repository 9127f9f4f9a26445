//! # apk_zip - Zip record codec for Android packages
//!
//! Reads and writes the subset of the zip format used by Android application
//! packages, and implements the two repackaging steps a patched package needs
//! before it can be signed:
//!
//! - **merge**: write generated code units (`classesN.dex`) into a new archive
//!   and copy every other entry of the original package raw, in order
//! - **align**: place each entry's data on a 4-byte boundary, or a 4096-byte
//!   boundary for uncompressed native libraries, using the same `0xD935`
//!   extra record as `zipalign`
//!
//! ## Examples
//!
//! ```no_run
//! use apk_zip::{align, check_alignment, merge, CodeUnit};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), apk_zip::Error> {
//! let units = vec![CodeUnit::new("classes.dex", std::fs::read("classes.dex")?)];
//! merge(&units, Path::new("base.apk"), Path::new("patched.apk"))?;
//! align(Path::new("patched.apk"), Path::new("aligned.apk"))?;
//! assert!(check_alignment(Path::new("aligned.apk"))?.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ZIP64 archives and multi-disk archives are rejected with
//! [`Error::Unsupported`].

#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod align;
pub mod archive;
pub mod error;
pub mod header;
pub mod merge;
pub mod writer;

pub use align::{
    AlignSummary, DEFAULT_ALIGNMENT, Misalignment, PAGE_ALIGNMENT, align, align_archive,
    check_alignment, check_archive_alignment, entry_alignment,
};
pub use archive::{ZipArchive, ZipEntry};
pub use error::{Error, Result};
pub use header::{CompressionMethod, EndOfCentralDirectory};
pub use merge::{CodeUnit, MergeSummary, is_v1_signature_file, merge, merge_archive};
pub use writer::ZipWriter;

/// Whether the bytes start with a local file header signature
pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[..4] == header::LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes()
}
