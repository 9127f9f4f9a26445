//! APK Signature Scheme v2
//!
//! The archive is split into three sections (entries, central directory, end
//! of central directory). Each section is digested in 1 MiB chunks, the chunk
//! digests are digested again, and the result is signed. The signature lives
//! in an APK signing block inserted between the entries and the central
//! directory:
//!
//! ```text
//! u64 block size | (u64 len, u32 id, value)* | u64 block size | "APK Sig Block 42"
//! ```
//!
//! While digesting, the end record's central directory offset is taken to
//! point at the signing block, so the signature covers the layout before the
//! block was inserted.

use crate::certificate::Certificate;
use crate::identity::SigningIdentity;
use crate::{Error, Result};
use apk_zip::EndOfCentralDirectory;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::io::Cursor;

/// Signing block footer magic
pub const APK_SIG_BLOCK_MAGIC: &[u8; 16] = b"APK Sig Block 42";

/// ID of the v2 signature scheme block inside the signing block
pub const V2_BLOCK_ID: u32 = 0x7109_871A;

/// RSASSA-PKCS1-v1_5 with SHA2-256 digest
pub const SIGNATURE_RSA_PKCS1_V1_5_WITH_SHA256: u32 = 0x0103;

/// Section chunk size for digesting
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Smallest possible signing block: two size fields and the magic
const MIN_BLOCK_SIZE: u64 = 8 + 8 + 16;

/// Offset of the central directory offset field within the end record
const EOCD_CD_OFFSET_FIELD: usize = 16;

/// Sections of an archive as laid out on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    /// End of the entry section (start of the signing block, if any)
    entries_end: u64,
    /// Start of the central directory
    central_directory: u64,
    /// Start of the end of central directory record
    end_record: u64,
}

impl Layout {
    fn has_signing_block(&self) -> bool {
        self.entries_end != self.central_directory
    }
}

/// Details of a verified signer
#[derive(Debug, Clone)]
pub struct VerifiedSigner {
    /// The signer's certificate
    pub certificate: Certificate,
    /// Top-level content digest
    pub digest: [u8; 32],
}

/// Sign an archive held in memory, returning the signed bytes
///
/// An existing signing block is replaced.
pub fn sign_bytes(apk: &[u8], identity: &SigningIdentity) -> Result<Vec<u8>> {
    let layout = locate(apk)?;
    if layout.has_signing_block() {
        log::info!(
            "Replacing existing signing block ({} bytes)",
            layout.central_directory - layout.entries_end
        );
    }

    let entries = &apk[..layout.entries_end as usize];
    let central_directory = &apk[layout.central_directory as usize..layout.end_record as usize];
    let end_record = &apk[layout.end_record as usize..];

    let digest = content_digest(entries, central_directory, end_record, layout.entries_end)?;
    log::debug!("Content digest computed over {} bytes", apk.len());

    let signed_data = encode_signed_data(&digest, identity.certificate().der());
    let signed_data_digest = Sha256::digest(&signed_data);
    let signature = identity
        .key()
        .sign(Pkcs1v15Sign::new::<Sha256>(), &signed_data_digest)
        .map_err(|e| Error::signature(format!("RSA signing failed: {}", e)))?;

    let public_key = identity
        .key()
        .to_public_key()
        .to_public_key_der()
        .map_err(|e| Error::key(format!("Failed to encode public key: {}", e)))?;

    let mut signature_record = Vec::new();
    signature_record.write_u32::<LittleEndian>(SIGNATURE_RSA_PKCS1_V1_5_WITH_SHA256)?;
    put_prefixed(&mut signature_record, &signature);

    let mut signer = Vec::new();
    put_prefixed(&mut signer, &signed_data);
    put_prefixed(&mut signer, &prefixed(&signature_record));
    put_prefixed(&mut signer, public_key.as_bytes());

    let mut signers = Vec::new();
    put_prefixed(&mut signers, &signer);
    let mut v2_block = Vec::new();
    put_prefixed(&mut v2_block, &signers);

    let signing_block = encode_signing_block(V2_BLOCK_ID, &v2_block)?;
    let new_cd_offset = layout.entries_end + signing_block.len() as u64;
    let new_cd_offset = u32::try_from(new_cd_offset)
        .map_err(|_| Error::signature("Signed archive would exceed 4 GiB"))?;

    let mut out = Vec::with_capacity(apk.len() + signing_block.len());
    out.extend_from_slice(entries);
    out.extend_from_slice(&signing_block);
    out.extend_from_slice(central_directory);
    out.extend_from_slice(&patch_cd_offset(end_record, new_cd_offset));

    log::debug!(
        "Inserted {}-byte signing block at 0x{:X}",
        signing_block.len(),
        layout.entries_end
    );
    Ok(out)
}

/// Verify the v2 signature of an archive held in memory
pub fn verify_bytes(apk: &[u8]) -> Result<VerifiedSigner> {
    let layout = locate(apk)?;
    if !layout.has_signing_block() {
        return Err(Error::verification("Archive has no APK signing block"));
    }

    let block = &apk[layout.entries_end as usize..layout.central_directory as usize];
    let v2_block = find_block_value(block, V2_BLOCK_ID)?
        .ok_or_else(|| Error::verification("Signing block has no v2 signature"))?;

    let mut signers = Slice::new(v2_block).prefixed()?;
    let mut signer = signers.prefixed()?;
    if !signers.is_empty() {
        return Err(Error::verification("Multiple v2 signers are not supported"));
    }

    let signed_data = signer.prefixed()?.rest();
    let mut signatures = signer.prefixed()?;
    let public_key_der = signer.prefixed()?.rest();

    let public_key = RsaPublicKey::from_public_key_der(public_key_der)
        .map_err(|e| Error::verification(format!("Invalid signer public key: {}", e)))?;

    let mut signature = None;
    while !signatures.is_empty() {
        let mut record = signatures.prefixed()?;
        let algorithm = record.u32()?;
        let bytes = record.prefixed()?.rest();
        if algorithm == SIGNATURE_RSA_PKCS1_V1_5_WITH_SHA256 {
            signature = Some(bytes);
        } else {
            log::debug!("Skipping signature with algorithm 0x{:04X}", algorithm);
        }
    }
    let signature = signature
        .ok_or_else(|| Error::verification("No RSA/SHA-256 signature from signer"))?;

    public_key
        .verify(
            Pkcs1v15Sign::new::<Sha256>(),
            &Sha256::digest(signed_data),
            signature,
        )
        .map_err(|_| Error::verification("Signature does not match signed data"))?;

    let (expected_digest, certificate) = decode_signed_data(signed_data)?;
    if certificate.public_key_info() != public_key_der {
        return Err(Error::verification(
            "Certificate public key does not match signer public key",
        ));
    }

    let entries = &apk[..layout.entries_end as usize];
    let central_directory = &apk[layout.central_directory as usize..layout.end_record as usize];
    let end_record = &apk[layout.end_record as usize..];
    let actual = content_digest(entries, central_directory, end_record, layout.entries_end)?;
    if actual != expected_digest {
        return Err(Error::verification("Content digest does not match"));
    }

    Ok(VerifiedSigner {
        certificate,
        digest: actual,
    })
}

/// Find the sections of an archive, including an existing signing block
fn locate(apk: &[u8]) -> Result<Layout> {
    let (end_record, eocd) = EndOfCentralDirectory::find(&mut Cursor::new(apk))?;
    let central_directory = eocd.central_directory_offset as u64;

    let mut entries_end = central_directory;
    if central_directory >= MIN_BLOCK_SIZE {
        let footer = &apk[(central_directory - 24) as usize..central_directory as usize];
        if &footer[8..] == APK_SIG_BLOCK_MAGIC {
            let size = u64::from_le_bytes(copy_array(&footer[..8]));
            let start = central_directory
                .checked_sub(size)
                .and_then(|v| v.checked_sub(8))
                .filter(|_| size >= MIN_BLOCK_SIZE - 8)
                .ok_or_else(|| Error::verification("Signing block size out of range"))?;
            let header_size =
                u64::from_le_bytes(copy_array(&apk[start as usize..start as usize + 8]));
            if header_size != size {
                return Err(Error::verification(
                    "Signing block header and footer sizes differ",
                ));
            }
            entries_end = start;
        }
    }

    Ok(Layout {
        entries_end,
        central_directory,
        end_record,
    })
}

fn find_block_value(block: &[u8], id: u32) -> Result<Option<&[u8]>> {
    // Skip the leading size; stop before the trailing size and magic.
    let pairs_end = block.len() - 24;
    let mut pairs = Slice::new(&block[8..pairs_end]);
    while !pairs.is_empty() {
        let len = pairs.u64()?;
        if len < 4 || len > pairs.remaining() as u64 {
            return Err(Error::verification("Signing block pair length out of range"));
        }
        let pair_id = pairs.u32()?;
        let value = pairs.take(len as usize - 4)?;
        if pair_id == id {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn content_digest(
    entries: &[u8],
    central_directory: &[u8],
    end_record: &[u8],
    entries_end: u64,
) -> Result<[u8; 32]> {
    let cd_offset = u32::try_from(entries_end)
        .map_err(|_| Error::signature("Entry section exceeds 4 GiB"))?;
    let end_record = patch_cd_offset(end_record, cd_offset);

    let sections: [&[u8]; 3] = [entries, central_directory, &end_record];
    let chunk_count: usize = sections
        .iter()
        .map(|section| section.len().div_ceil(CHUNK_SIZE))
        .sum();
    let chunk_count = u32::try_from(chunk_count)
        .map_err(|_| Error::signature("Too many chunks to digest"))?;

    let mut top = Sha256::new();
    top.update([0x5Au8]);
    top.update(chunk_count.to_le_bytes());
    for section in sections {
        for chunk in section.chunks(CHUNK_SIZE) {
            let mut hasher = Sha256::new();
            hasher.update([0xA5u8]);
            hasher.update((chunk.len() as u32).to_le_bytes());
            hasher.update(chunk);
            top.update(hasher.finalize());
        }
    }

    let mut digest = [0u8; 32];
    digest.copy_from_slice(&top.finalize());
    Ok(digest)
}

fn encode_signed_data(digest: &[u8; 32], certificate: &[u8]) -> Vec<u8> {
    let mut digest_record = Vec::new();
    digest_record.extend_from_slice(&SIGNATURE_RSA_PKCS1_V1_5_WITH_SHA256.to_le_bytes());
    put_prefixed(&mut digest_record, digest);

    let mut signed_data = Vec::new();
    put_prefixed(&mut signed_data, &prefixed(&digest_record));
    put_prefixed(&mut signed_data, &prefixed(certificate));
    put_prefixed(&mut signed_data, &[]); // additional attributes
    signed_data
}

fn decode_signed_data(signed_data: &[u8]) -> Result<([u8; 32], Certificate)> {
    let mut data = Slice::new(signed_data);
    let mut digests = data.prefixed()?;
    let mut certificates = data.prefixed()?;

    let mut digest = None;
    while !digests.is_empty() {
        let mut record = digests.prefixed()?;
        let algorithm = record.u32()?;
        let value = record.prefixed()?.rest();
        if algorithm == SIGNATURE_RSA_PKCS1_V1_5_WITH_SHA256 && value.len() == 32 {
            digest = Some(copy_array(value));
        }
    }
    let digest = digest.ok_or_else(|| Error::verification("No SHA-256 content digest"))?;

    if certificates.is_empty() {
        return Err(Error::verification("Signer has no certificate"));
    }
    let certificate = Certificate::from_der(certificates.prefixed()?.rest().to_vec())?;
    Ok((digest, certificate))
}

fn encode_signing_block(id: u32, value: &[u8]) -> Result<Vec<u8>> {
    let pair_len = 4 + value.len() as u64;
    let block_size = 8 + pair_len + 8 + 16;

    let mut block = Vec::with_capacity(block_size as usize + 8);
    block.write_u64::<LittleEndian>(block_size)?;
    block.write_u64::<LittleEndian>(pair_len)?;
    block.write_u32::<LittleEndian>(id)?;
    block.extend_from_slice(value);
    block.write_u64::<LittleEndian>(block_size)?;
    block.extend_from_slice(APK_SIG_BLOCK_MAGIC);
    Ok(block)
}

fn patch_cd_offset(end_record: &[u8], offset: u32) -> Vec<u8> {
    let mut patched = end_record.to_vec();
    patched[EOCD_CD_OFFSET_FIELD..EOCD_CD_OFFSET_FIELD + 4].copy_from_slice(&offset.to_le_bytes());
    patched
}

fn prefixed(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 4);
    put_prefixed(&mut out, data);
    out
}

fn put_prefixed(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
}

fn copy_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Bounds-checked reader over length-prefixed v2 structures
struct Slice<'a> {
    data: &'a [u8],
}

impl<'a> Slice<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn remaining(&self) -> usize {
        self.data.len()
    }

    fn rest(self) -> &'a [u8] {
        self.data
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let data: &'a [u8] = self.data;
        if len > data.len() {
            return Err(Error::verification("Truncated v2 signature structure"));
        }
        let (head, tail) = data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    fn u32(&mut self) -> Result<u32> {
        let mut bytes = self.take(4)?;
        Ok(bytes.read_u32::<LittleEndian>()?)
    }

    fn u64(&mut self) -> Result<u64> {
        let mut bytes = self.take(8)?;
        Ok(bytes.read_u64::<LittleEndian>()?)
    }

    fn prefixed(&mut self) -> Result<Slice<'a>> {
        let len = self.u32()? as usize;
        Ok(Slice::new(self.take(len)?))
    }
}
