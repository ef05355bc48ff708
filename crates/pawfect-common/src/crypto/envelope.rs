//! Sealed value wire format
//!
//! Format v1:
//! [1 byte: format=1][1 byte: key version][16 bytes: salt][12 bytes: IV]
//! [16 bytes: GCM tag][N bytes: ciphertext]
//!
//! The whole envelope is base64 encoded (standard alphabet, padded).

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

pub const FORMAT_VERSION: u8 = 1;
pub const SALT_LENGTH: usize = 16;
pub const IV_LENGTH: usize = 12;
pub const TAG_LENGTH: usize = 16;

/// Bytes preceding the ciphertext
pub const HEADER_LENGTH: usize = 2 + SALT_LENGTH + IV_LENGTH + TAG_LENGTH;

/// Smallest possible sealed value. Empty plaintext is never sealed, so at
/// least one ciphertext byte is always present.
pub const MIN_ENVELOPE_LENGTH: usize = HEADER_LENGTH + 1;

const SALT_OFFSET: usize = 2;
const IV_OFFSET: usize = SALT_OFFSET + SALT_LENGTH;
const TAG_OFFSET: usize = IV_OFFSET + IV_LENGTH;

/// Decoded view over a sealed value
#[derive(Debug)]
pub struct Envelope {
    bytes: Vec<u8>,
}

impl Envelope {
    /// Assemble an envelope from its parts
    pub fn assemble(
        key_version: u8,
        salt: &[u8; SALT_LENGTH],
        iv: &[u8; IV_LENGTH],
        tag: &[u8],
        ciphertext: &[u8],
    ) -> Self {
        let mut bytes = Vec::with_capacity(HEADER_LENGTH + ciphertext.len());
        bytes.push(FORMAT_VERSION);
        bytes.push(key_version);
        bytes.extend_from_slice(salt);
        bytes.extend_from_slice(iv);
        bytes.extend_from_slice(tag);
        bytes.extend_from_slice(ciphertext);
        Self { bytes }
    }

    /// Decode base64 and check the minimum length. The format byte is not
    /// checked here so callers can report it separately.
    pub fn decode(encoded: &str) -> Option<Self> {
        let bytes = BASE64.decode(encoded.trim()).ok()?;
        if bytes.len() < MIN_ENVELOPE_LENGTH {
            return None;
        }
        Some(Self { bytes })
    }

    pub fn encode(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn format_version(&self) -> u8 {
        self.bytes[0]
    }

    pub fn key_version(&self) -> u8 {
        self.bytes[1]
    }

    pub fn salt(&self) -> &[u8] {
        &self.bytes[SALT_OFFSET..IV_OFFSET]
    }

    pub fn iv(&self) -> &[u8] {
        &self.bytes[IV_OFFSET..TAG_OFFSET]
    }

    pub fn tag(&self) -> &[u8] {
        &self.bytes[TAG_OFFSET..HEADER_LENGTH]
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.bytes[HEADER_LENGTH..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Metadata about a possibly sealed value, obtained without decrypting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealInfo {
    pub sealed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_version: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_version: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plaintext_length: Option<usize>,
}

impl SealInfo {
    pub fn unsealed() -> Self {
        Self::default()
    }
}

/// Heuristic check that `value` is a sealed envelope of the current format
pub fn is_sealed(value: &str) -> bool {
    Envelope::decode(value).is_some_and(|env| env.format_version() == FORMAT_VERSION)
}

/// Report envelope metadata without any key lookup or decryption
pub fn inspect(value: &str) -> SealInfo {
    match Envelope::decode(value) {
        Some(env) if env.format_version() == FORMAT_VERSION => SealInfo {
            sealed: true,
            format_version: Some(env.format_version()),
            key_version: Some(env.key_version()),
            // GCM ciphertext length equals plaintext length
            plaintext_length: Some(env.ciphertext().len()),
        },
        _ => SealInfo::unsealed(),
    }
}
