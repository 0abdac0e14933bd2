//! Scan options DTO

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::ScanError;
use crate::domain::entities::ScanMode;
use crate::formats::WalkLimits;

/// Tunables for the scanning core
///
/// Every field has a default, so a JSON config only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanOptions {
    /// Wall-clock budget for light scans
    pub light_timeout_ms: u64,
    /// Wall-clock budget for full scans
    pub full_timeout_ms: u64,
    /// Inputs larger than this are rejected unread
    pub max_file_size: u64,
    /// Share of the file a metadata block may take before it is implausible
    pub oversized_chunk_ratio: f64,
    /// Blocks smaller than this are never reported as oversized
    pub oversized_chunk_min_bytes: u64,
    /// Cap on chunks/segments/IFDs walked per file
    pub max_structure_entries: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        let limits = WalkLimits::default();
        Self {
            light_timeout_ms: 500,
            full_timeout_ms: 3_000,
            max_file_size: 64 * 1024 * 1024, // 64MB
            oversized_chunk_ratio: limits.oversized_ratio,
            oversized_chunk_min_bytes: limits.oversized_min_bytes,
            max_structure_entries: limits.max_entries,
        }
    }
}

impl ScanOptions {
    /// Reads options from a JSON file and validates them
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ScanError::Config(format!("cannot read {}: {e}", path.display())))?;
        let options: Self = serde_json::from_str(&text)
            .map_err(|e| ScanError::Config(format!("{}: {e}", path.display())))?;
        options.validate()?;
        Ok(options)
    }

    /// Checks value ranges
    pub fn validate(&self) -> Result<(), ScanError> {
        if !(self.oversized_chunk_ratio > 0.0 && self.oversized_chunk_ratio <= 1.0) {
            return Err(ScanError::Config(format!(
                "oversized_chunk_ratio must be in (0, 1], got {}",
                self.oversized_chunk_ratio
            )));
        }
        if self.max_file_size == 0 {
            return Err(ScanError::Config("max_file_size must be positive".into()));
        }
        if self.max_structure_entries == 0 {
            return Err(ScanError::Config(
                "max_structure_entries must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Sets both wall-clock budgets
    pub fn with_timeouts(mut self, light: Duration, full: Duration) -> Self {
        self.light_timeout_ms = light.as_millis() as u64;
        self.full_timeout_ms = full.as_millis() as u64;
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Sets the oversize heuristic
    pub fn with_oversized_chunk(mut self, ratio: f64, min_bytes: u64) -> Self {
        self.oversized_chunk_ratio = ratio;
        self.oversized_chunk_min_bytes = min_bytes;
        self
    }

    pub fn with_max_structure_entries(mut self, entries: usize) -> Self {
        self.max_structure_entries = entries;
        self
    }

    pub fn timeout(&self, mode: ScanMode) -> Duration {
        Duration::from_millis(match mode {
            ScanMode::Light => self.light_timeout_ms,
            ScanMode::Full => self.full_timeout_ms,
        })
    }

    pub fn walk_limits(&self) -> WalkLimits {
        WalkLimits {
            oversized_ratio: self.oversized_chunk_ratio,
            oversized_min_bytes: self.oversized_chunk_min_bytes,
            max_entries: self.max_structure_entries,
        }
    }
}
