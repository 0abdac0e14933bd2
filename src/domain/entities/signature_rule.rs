//! Signature rule entity
//!
//! A byte pattern with a severity, optionally pinned to an offset and to a
//! subset of container formats.

use std::fmt;

use serde::Deserialize;

use super::finding::Severity;
use crate::formats::ImageFormat;

/// Literal byte sequence a rule looks for
#[derive(Clone, PartialEq, Eq)]
pub struct BytePattern(Vec<u8>);

impl BytePattern {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for BytePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BytePattern({})", hex::encode(&self.0))
    }
}

/// Where a floating pattern has to start for a hit to count
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alignment {
    #[default]
    Anywhere,
    /// At a marker segment reached by walking the JPEG segment chain
    JpegSegment,
}

/// One detection rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRule {
    pub id: String,
    pub severity: Severity,
    pub description: String,
    pub pattern: BytePattern,
    /// Fixed offset the pattern must start at; `None` matches anywhere
    pub offset: Option<u64>,
    /// Formats the rule applies to; empty means all
    pub formats: Vec<ImageFormat>,
    pub alignment: Alignment,
}

impl SignatureRule {
    pub fn new(
        id: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
        pattern: BytePattern,
    ) -> Self {
        Self {
            id: id.into(),
            severity,
            description: description.into(),
            pattern,
            offset: None,
            formats: Vec::new(),
            alignment: Alignment::Anywhere,
        }
    }

    /// Pins the pattern to a fixed offset
    pub fn anchored_at(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Restricts the rule to the given formats
    pub fn for_formats(mut self, formats: Vec<ImageFormat>) -> Self {
        self.formats = formats;
        self
    }

    /// Restricts where a floating pattern may match
    pub fn aligned(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn applies_to(&self, format: ImageFormat) -> bool {
        self.formats.is_empty() || self.formats.contains(&format)
    }

    /// Checks an anchored rule against `data`; floating rules never match here
    pub fn matches_anchored(&self, data: &[u8]) -> bool {
        let Some(offset) = self.offset.and_then(|o| usize::try_from(o).ok()) else {
            return false;
        };
        offset
            .checked_add(self.pattern.len())
            .and_then(|end| data.get(offset..end))
            .is_some_and(|window| window == self.pattern.as_bytes())
    }
}
