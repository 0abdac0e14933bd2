//! File identity entity
//!
//! What the bytes actually are, as opposed to what the upload claimed.

use std::fmt;

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::formats::ImageFormat;

/// SHA-256 over the full input buffer
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Hashes the whole buffer
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parses 64 hex characters, either case
    pub fn from_hex(text: &str) -> Option<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(text, &mut bytes).ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Pixel dimensions read from the container header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: usize,
    pub height: usize,
}

/// Derived, read-only facts about the scanned bytes
///
/// Computed once per request after format validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileIdentity {
    /// MIME type sniffed from magic bytes
    pub mime: &'static str,
    /// Container format sniffed from magic bytes
    pub format: ImageFormat,
    pub digest: ContentDigest,
    pub dimensions: Dimensions,
    /// Extension from the declared filename, lowercased
    pub declared_extension: String,
}

impl FileIdentity {
    /// Whether the declared extension names a different format
    pub fn extension_mismatch(&self) -> bool {
        ImageFormat::from_extension(&self.declared_extension) != Some(self.format)
    }
}
