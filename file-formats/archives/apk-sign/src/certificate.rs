//! Self-signed X.509 certificates
//!
//! Only what an APK signer needs: build a self-signed RSA certificate for a
//! common name, and read back the subject and public key of a certificate.
//! The DER handling is a minimal tag-length-value codec, not a general ASN.1
//! implementation.

use crate::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Datelike, Duration, Utc};
use rand_core::{OsRng, RngCore};
use rsa::pkcs8::EncodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256};

const TAG_INTEGER: u8 = 0x02;
const TAG_BIT_STRING: u8 = 0x03;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_UTF8_STRING: u8 = 0x0C;
const TAG_PRINTABLE_STRING: u8 = 0x13;
const TAG_UTC_TIME: u8 = 0x17;
const TAG_GENERALIZED_TIME: u8 = 0x18;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_SET: u8 = 0x31;
const TAG_VERSION: u8 = 0xA0;

/// sha256WithRSAEncryption (1.2.840.113549.1.1.11)
const OID_SHA256_WITH_RSA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B];

/// id-at-commonName (2.5.4.3)
const OID_COMMON_NAME: &[u8] = &[0x55, 0x04, 0x03];

/// How long a generated certificate stays valid
const VALIDITY_YEARS: i64 = 30;

const PEM_LABEL: &str = "CERTIFICATE";

/// A DER-encoded X.509 certificate with the fields the signer uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    subject_common_name: Option<String>,
    public_key_info: Vec<u8>,
}

impl Certificate {
    /// Generate a self-signed certificate for `key`
    pub fn self_signed(key: &RsaPrivateKey, common_name: &str) -> Result<Self> {
        let spki = key
            .to_public_key()
            .to_public_key_der()
            .map_err(|e| Error::key(format!("Failed to encode public key: {}", e)))?;

        let mut serial = [0u8; 8];
        OsRng.fill_bytes(&mut serial);
        serial[0] &= 0x7F;
        serial[0] |= 0x01;

        let not_before = Utc::now();
        let not_after = not_before + Duration::days(365 * VALIDITY_YEARS);
        let name = encode_name(common_name);

        let tbs = sequence(&[
            tlv(TAG_VERSION, &tlv(TAG_INTEGER, &[0x02])),
            tlv(TAG_INTEGER, &serial),
            signature_algorithm(),
            name.clone(),
            sequence(&[encode_time(not_before), encode_time(not_after)]),
            name,
            spki.as_bytes().to_vec(),
        ]);

        let digest = Sha256::digest(&tbs);
        let signature = key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| Error::certificate(format!("Failed to sign certificate: {}", e)))?;

        let mut bits = Vec::with_capacity(signature.len() + 1);
        bits.push(0);
        bits.extend_from_slice(&signature);

        let der = sequence(&[tbs, signature_algorithm(), tlv(TAG_BIT_STRING, &bits)]);
        log::debug!(
            "Generated self-signed certificate for CN={} ({} bytes)",
            common_name,
            der.len()
        );
        Self::from_der(der)
    }

    /// Parse a DER-encoded certificate
    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        let mut outer = DerReader::new(&der);
        let mut certificate = outer.enter(TAG_SEQUENCE)?;
        if !outer.is_empty() {
            return Err(Error::certificate("Trailing data after certificate"));
        }
        let mut tbs = certificate.enter(TAG_SEQUENCE)?;

        if tbs.peek_tag() == Some(TAG_VERSION) {
            tbs.skip()?;
        }
        tbs.expect(TAG_INTEGER)?; // serial
        tbs.expect(TAG_SEQUENCE)?; // signature algorithm
        tbs.expect(TAG_SEQUENCE)?; // issuer
        tbs.expect(TAG_SEQUENCE)?; // validity
        let subject = tbs.expect(TAG_SEQUENCE)?;
        let public_key_info = tbs.raw(TAG_SEQUENCE)?.to_vec();

        let subject_common_name = find_common_name(subject)?;
        Ok(Self {
            der,
            subject_common_name,
            public_key_info,
        })
    }

    /// Parse a PEM `CERTIFICATE` block
    pub fn from_pem(pem: &str) -> Result<Self> {
        let begin = format!("-----BEGIN {}-----", PEM_LABEL);
        let end = format!("-----END {}-----", PEM_LABEL);

        let start = pem
            .find(&begin)
            .ok_or_else(|| Error::certificate("Missing PEM certificate header"))?
            + begin.len();
        let stop = pem[start..]
            .find(&end)
            .ok_or_else(|| Error::certificate("Missing PEM certificate footer"))?
            + start;

        let body: String = pem[start..stop]
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let der = STANDARD
            .decode(body)
            .map_err(|e| Error::certificate(format!("Invalid PEM body: {}", e)))?;
        Self::from_der(der)
    }

    /// PEM encoding with 64-character lines
    pub fn to_pem(&self) -> String {
        let encoded = STANDARD.encode(&self.der);
        let mut pem = format!("-----BEGIN {}-----\n", PEM_LABEL);
        for line in encoded.as_bytes().chunks(64) {
            pem.push_str(&String::from_utf8_lossy(line));
            pem.push('\n');
        }
        pem.push_str(&format!("-----END {}-----\n", PEM_LABEL));
        pem
    }

    /// DER encoding
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Subject common name, if present
    pub fn subject_common_name(&self) -> Option<&str> {
        self.subject_common_name.as_deref()
    }

    /// DER SubjectPublicKeyInfo
    pub fn public_key_info(&self) -> &[u8] {
        &self.public_key_info
    }

    /// SHA-256 fingerprint of the DER encoding
    pub fn sha256_fingerprint(&self) -> [u8; 32] {
        let mut fingerprint = [0u8; 32];
        fingerprint.copy_from_slice(&Sha256::digest(&self.der));
        fingerprint
    }
}

fn signature_algorithm() -> Vec<u8> {
    sequence(&[tlv(TAG_OID, OID_SHA256_WITH_RSA), tlv(TAG_NULL, &[])])
}

fn encode_name(common_name: &str) -> Vec<u8> {
    let attribute = sequence(&[
        tlv(TAG_OID, OID_COMMON_NAME),
        tlv(TAG_UTF8_STRING, common_name.as_bytes()),
    ]);
    sequence(&[tlv(TAG_SET, &attribute)])
}

/// UTCTime through 2049, GeneralizedTime after, as X.509 requires
fn encode_time(time: DateTime<Utc>) -> Vec<u8> {
    if time.year() < 2050 {
        tlv(TAG_UTC_TIME, time.format("%y%m%d%H%M%SZ").to_string().as_bytes())
    } else {
        tlv(
            TAG_GENERALIZED_TIME,
            time.format("%Y%m%d%H%M%SZ").to_string().as_bytes(),
        )
    }
}

fn find_common_name(mut name: DerReader<'_>) -> Result<Option<String>> {
    while !name.is_empty() {
        let mut set = name.enter(TAG_SET)?;
        while !set.is_empty() {
            let mut attribute = set.enter(TAG_SEQUENCE)?;
            let oid = attribute.expect(TAG_OID)?;
            let (tag, value) = attribute.any()?;
            if oid.data == OID_COMMON_NAME
                && (tag == TAG_UTF8_STRING || tag == TAG_PRINTABLE_STRING)
            {
                return Ok(Some(String::from_utf8_lossy(value).into_owned()));
            }
        }
    }
    Ok(None)
}

fn tlv(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() + 6);
    out.push(tag);
    let len = value.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = (len as u64).to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
    out.extend_from_slice(value);
    out
}

fn sequence(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(TAG_SEQUENCE, &parts.concat())
}

/// Cursor over consecutive DER elements
#[derive(Debug, Clone, Copy)]
struct DerReader<'a> {
    data: &'a [u8],
}

impl<'a> DerReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn peek_tag(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// Next element as (tag, value, full encoding)
    fn next(&mut self) -> Result<(u8, &'a [u8], &'a [u8])> {
        let data: &'a [u8] = self.data;
        let truncated = || Error::certificate("Truncated DER element");
        let tag = *data.first().ok_or_else(truncated)?;
        let first = *data.get(1).ok_or_else(truncated)?;

        let (len, header) = if first < 0x80 {
            (first as usize, 2)
        } else {
            let count = (first & 0x7F) as usize;
            if count == 0 || count > 4 {
                return Err(Error::certificate("Unsupported DER length encoding"));
            }
            let bytes = data.get(2..2 + count).ok_or_else(truncated)?;
            let len = bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
            (len, 2 + count)
        };

        let end = header.checked_add(len).ok_or_else(truncated)?;
        let whole = data.get(..end).ok_or_else(truncated)?;
        self.data = &data[end..];
        Ok((tag, &whole[header..], whole))
    }

    fn any(&mut self) -> Result<(u8, &'a [u8])> {
        let (tag, value, _) = self.next()?;
        Ok((tag, value))
    }

    fn expect(&mut self, tag: u8) -> Result<DerReader<'a>> {
        let (found, value, _) = self.next()?;
        if found != tag {
            return Err(Error::certificate(format!(
                "Expected DER tag 0x{:02X}, found 0x{:02X}",
                tag, found
            )));
        }
        Ok(DerReader::new(value))
    }

    fn enter(&mut self, tag: u8) -> Result<DerReader<'a>> {
        self.expect(tag)
    }

    fn raw(&mut self, tag: u8) -> Result<&'a [u8]> {
        let (found, _, whole) = self.next()?;
        if found != tag {
            return Err(Error::certificate(format!(
                "Expected DER tag 0x{:02X}, found 0x{:02X}",
                tag, found
            )));
        }
        Ok(whole)
    }

    fn skip(&mut self) -> Result<()> {
        self.next().map(|_| ())
    }
}
