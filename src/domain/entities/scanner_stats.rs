//! Scanner statistics entity

use serde::Serialize;

/// Point-in-time copy of the process-wide scan counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScannerStats {
    /// Completed scans, all modes
    pub total_scans: u64,
    pub light_scans: u64,
    pub full_scans: u64,
    pub clean: u64,
    pub suspicious: u64,
    pub malicious: u64,
    /// Inputs refused before a verdict; not part of `total_scans`
    pub rejected: u64,
    /// Detector snapshot in effect when the copy was taken
    pub detector_version: u64,
}

impl ScannerStats {
    /// Sum of the verdict histogram; equals `total_scans` in any snapshot
    pub fn verdict_total(&self) -> u64 {
        self.clean + self.suspicious + self.malicious
    }
}
