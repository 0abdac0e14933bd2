//! JSON rule set format
//!
//! ```json
//! { "version": 1,
//!   "rules": [
//!     { "id": "php-open-tag", "severity": "critical",
//!       "description": "PHP open tag", "pattern": { "text": "<?php" } },
//!     { "id": "gif-js-polyglot", "severity": "warning",
//!       "description": "GIF/JS polyglot", "pattern": { "hex": "2f 2a" },
//!       "offset": 6, "formats": ["gif"] },
//!     { "id": "jpeg-com-zero-length", "severity": "critical",
//!       "description": "Zero-length COM", "pattern": { "hex": "ff fe 00 00" },
//!       "formats": ["jpeg"], "align": "jpeg-segment" }
//!   ] }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::RuleSetError;
use crate::domain::entities::{Alignment, BytePattern, Severity, SignatureRule};
use crate::domain::repositories::RuleSetSource;
use crate::formats::ImageFormat;

pub const RULE_SET_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleDocument {
    version: u32,
    rules: Vec<RuleDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleDefinition {
    id: String,
    severity: Severity,
    description: String,
    pattern: PatternDefinition,
    #[serde(default)]
    offset: Option<u64>,
    #[serde(default)]
    formats: Vec<ImageFormat>,
    #[serde(default)]
    align: Alignment,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PatternDefinition {
    /// Hex bytes; whitespace between digits is ignored
    Hex(String),
    /// UTF-8 text matched byte for byte
    Text(String),
}

impl PatternDefinition {
    fn decode(self, id: &str) -> Result<BytePattern, RuleSetError> {
        match self {
            PatternDefinition::Text(text) => Ok(BytePattern::new(text.into_bytes())),
            PatternDefinition::Hex(digits) => {
                let compact: String = digits.split_whitespace().collect();
                hex::decode(compact)
                    .map(BytePattern::new)
                    .map_err(|source| RuleSetError::InvalidHex {
                        id: id.to_string(),
                        source,
                    })
            }
        }
    }
}

/// Parses a rule document into rules in declared order
pub fn parse_rule_document(text: &str) -> Result<Vec<SignatureRule>, RuleSetError> {
    let document: RuleDocument = serde_json::from_str(text)?;
    if document.version != RULE_SET_VERSION {
        return Err(RuleSetError::UnsupportedVersion(document.version));
    }

    document
        .rules
        .into_iter()
        .map(|definition| {
            let pattern = definition.pattern.decode(&definition.id)?;
            let mut rule = SignatureRule::new(
                definition.id,
                definition.severity,
                definition.description,
                pattern,
            )
            .for_formats(definition.formats)
            .aligned(definition.align);
            rule.offset = definition.offset;
            Ok(rule)
        })
        .collect()
}

/// Rule document on disk
#[derive(Debug, Clone)]
pub struct JsonRuleFile {
    path: PathBuf,
}

impl JsonRuleFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl RuleSetSource for JsonRuleFile {
    fn load(&self) -> Result<Vec<SignatureRule>, RuleSetError> {
        let text = fs::read_to_string(&self.path).map_err(|source| RuleSetError::Io {
            path: self.path.clone(),
            source,
        })?;
        let rules = parse_rule_document(&text)?;
        tracing::info!(path = %self.path.display(), rules = rules.len(), "Loaded rule file");
        Ok(rules)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
