//! Scan request entity

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::RejectionReason;

/// Which latency budget a scan runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Critical checks only, sub-500ms
    Light,
    /// Every detector including the structural walk
    Full,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Light => "light",
            ScanMode::Full => "full",
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(ScanMode::Light),
            "full" => Ok(ScanMode::Full),
            other => Err(format!("unknown scan mode '{other}' (expected light or full)")),
        }
    }
}

/// One untrusted upload to classify
///
/// Borrowed and immutable: the scanner never writes to the buffer.
#[derive(Debug, Clone, Copy)]
pub struct ScanRequest<'a> {
    data: &'a [u8],
    filename: &'a str,
    mode: ScanMode,
}

impl<'a> ScanRequest<'a> {
    /// Creates a request, refusing an empty buffer
    pub fn new(
        data: &'a [u8],
        filename: &'a str,
        mode: ScanMode,
    ) -> Result<Self, RejectionReason> {
        if data.is_empty() {
            return Err(RejectionReason::EmptyInput);
        }
        Ok(Self {
            data,
            filename,
            mode,
        })
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn filename(&self) -> &'a str {
        self.filename
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    /// Lowercased extension of the declared filename, empty when absent
    pub fn extension(&self) -> String {
        Path::new(self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default()
    }
}
