//! Process-wide scan counters

use parking_lot::Mutex;

use crate::domain::entities::{ScanMode, ScannerStats, Verdict};

/// Counts completed scans by mode and verdict
///
/// All counters live behind one lock, so a snapshot never shows a scan
/// counted in `total_scans` but missing from the verdict histogram.
#[derive(Debug, Default)]
pub struct StatsTracker {
    counters: Mutex<ScannerStats>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed scan
    pub fn record(&self, mode: ScanMode, verdict: Verdict) {
        let mut stats = self.counters.lock();
        stats.total_scans += 1;
        match mode {
            ScanMode::Light => stats.light_scans += 1,
            ScanMode::Full => stats.full_scans += 1,
        }
        match verdict {
            Verdict::Clean => stats.clean += 1,
            Verdict::Suspicious => stats.suspicious += 1,
            Verdict::Malicious => stats.malicious += 1,
        }
    }

    /// Records one input refused before a verdict
    pub fn record_rejection(&self) {
        self.counters.lock().rejected += 1;
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> ScannerStats {
        self.counters.lock().clone()
    }
}
