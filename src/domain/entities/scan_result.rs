//! Scan result entity
//!
//! Represents what the scanner concluded about one upload.

use std::time::Duration;

use serde::{Serialize, Serializer};

use super::file_identity::{ContentDigest, Dimensions, FileIdentity};
use super::finding::{Finding, Verdict};
use super::scan_request::ScanMode;
use crate::core::RejectionReason;
use crate::formats::ImageFormat;

fn as_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64() * 1000.0)
}

/// Verdict and findings of a completed scan
///
/// Built once by the orchestrator and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    verdict: Verdict,
    findings: Vec<Finding>,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    elapsed: Duration,
    mode: ScanMode,
    format: ImageFormat,
    mime: &'static str,
    digest: ContentDigest,
    dimensions: Dimensions,
    detector_version: u64,
    timed_out: bool,
}

impl ScanResult {
    /// Creates a result; the verdict is derived from `findings`
    pub fn new(
        identity: &FileIdentity,
        findings: Vec<Finding>,
        elapsed: Duration,
        mode: ScanMode,
        detector_version: u64,
        timed_out: bool,
    ) -> Self {
        Self {
            verdict: Verdict::from_findings(&findings),
            findings,
            elapsed,
            mode,
            format: identity.format,
            mime: identity.mime,
            digest: identity.digest,
            dimensions: identity.dimensions,
            detector_version,
            timed_out,
        }
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Findings ordered by severity (critical first), then rule id
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    pub fn digest(&self) -> ContentDigest {
        self.digest
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Version of the detector snapshot the scan ran against
    pub fn detector_version(&self) -> u64 {
        self.detector_version
    }

    /// Whether the wall-clock budget ran out before all stages finished
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Returns a summary string
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} ({} {}x{}, {} scan) in {:.1}ms\n",
            self.verdict,
            self.format,
            self.dimensions.width,
            self.dimensions.height,
            self.mode,
            self.elapsed.as_secs_f64() * 1000.0
        );
        for finding in &self.findings {
            summary.push_str(&format!("  - {finding}\n"));
        }
        summary
    }
}

/// An input refused before any verdict was produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub reason: RejectionReason,
    pub mode: ScanMode,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

/// Either a verdict or a structured rejection
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    Completed(ScanResult),
    Rejected(Rejection),
}

impl ScanOutcome {
    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            ScanOutcome::Completed(result) => Some(result.verdict()),
            ScanOutcome::Rejected(_) => None,
        }
    }

    pub fn result(&self) -> Option<&ScanResult> {
        match self {
            ScanOutcome::Completed(result) => Some(result),
            ScanOutcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&RejectionReason> {
        match self {
            ScanOutcome::Completed(_) => None,
            ScanOutcome::Rejected(rejection) => Some(&rejection.reason),
        }
    }

    pub fn into_result(self) -> Option<ScanResult> {
        match self {
            ScanOutcome::Completed(result) => Some(result),
            ScanOutcome::Rejected(_) => None,
        }
    }
}
