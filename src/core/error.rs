use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::formats::ImageFormat;

/// Reasons an input is refused before any verdict is produced.
///
/// These are terminal and non-retryable: the file is not a valid image of a
/// supported kind, which is a different statement from "clean" or "malicious".
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("Empty input buffer")]
    EmptyInput,

    #[error("Unsupported file extension: {extension:?}")]
    UnsupportedExtension { extension: String },

    #[error("Content is not a supported image type (detected {detected})")]
    MimeMismatch { detected: String },

    #[error("Corrupt {format} container: {detail}")]
    CorruptContainer { format: ImageFormat, detail: String },

    #[error("File size {size} exceeds limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },
}

/// Errors reading the malware hash database.
#[derive(Error, Debug)]
pub enum HashDatabaseError {
    #[error("Failed to read hash database {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors loading or validating a signature rule set.
#[derive(Error, Debug)]
pub enum RuleSetError {
    #[error("Failed to read rule file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed rule set: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported rule set version {0}")]
    UnsupportedVersion(u32),

    #[error("Rule set contains no rules")]
    Empty,

    #[error("Rule with empty identifier at position {0}")]
    EmptyId(usize),

    #[error("Duplicate rule identifier: {0}")]
    DuplicateId(String),

    #[error("Rule {0} has an empty pattern")]
    EmptyPattern(String),

    #[error("Rule {id} has an invalid hex pattern: {source}")]
    InvalidHex {
        id: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error("Failed to compile pattern automaton: {0}")]
    Automaton(#[from] aho_corasick::BuildError),
}

/// Fatal errors surfaced by the scanning core.
///
/// Hostile or malformed input never produces one of these; it becomes a
/// finding or a [`RejectionReason`] instead.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Signature rule set unavailable: {0}")]
    RuleSet(#[from] RuleSetError),

    #[error("Hash database unavailable: {0}")]
    HashDatabase(#[from] HashDatabaseError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Scan cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ScanError>;
