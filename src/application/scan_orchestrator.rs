//! Scan orchestrator
//!
//! Runs one scan as an explicit state machine:
//!
//! ```text
//! Received -> FormatChecked -> HashChecked -> SignatureChecked -> [StructureChecked] -> Completed
//!     |              |                              |
//!     +-- reject ----+-- hash match ----------------+-- light mode / budget spent --> Completed
//! ```
//!
//! Each step owns the data the next step needs, so no stage can run without
//! its inputs. Cancellation is checked before every step. The wall-clock
//! budget is checked at every stage boundary after hashing, including the
//! one leaving the last stage; a running stage is never interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::application::detector_registry::DetectorSet;
use crate::application::dto::ScanOptions;
use crate::application::stats_tracker::StatsTracker;
use crate::core::{RejectionReason, Result, ScanError};
use crate::domain::entities::{
    FileIdentity, Finding, Rejection, ScanMode, ScanOutcome, ScanRequest, ScanResult, Severity,
    Stage, Verdict,
};
use crate::domain::services::{
    FormatCheck, FormatValidator, HashMatcher, StructuralAnomalyInspector,
};

pub const TIMEOUT_RULE: &str = "orchestrator.timeout";
pub const TIMEOUT_DESCRIPTION: &str = "scan exceeded time budget";

/// Observable position of a scan in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanState {
    Received,
    FormatChecked,
    HashChecked,
    SignatureChecked,
    StructureChecked,
    Completed,
}

/// Instrumentation hook called on every state transition
pub trait ScanObserver: Send + Sync {
    fn on_transition(&self, from: ScanState, to: ScanState);
}

/// Caller-side cancellation flag, checked at each stage boundary
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

enum Step {
    Received,
    FormatChecked(FormatCheck),
    HashChecked(FileIdentity),
    SignatureChecked(FileIdentity),
    StructureChecked(FileIdentity),
    Rejected(RejectionReason),
    Completed(FileIdentity),
}

impl Step {
    fn state(&self) -> ScanState {
        match self {
            Step::Received => ScanState::Received,
            Step::FormatChecked(_) => ScanState::FormatChecked,
            Step::HashChecked(_) => ScanState::HashChecked,
            Step::SignatureChecked(_) => ScanState::SignatureChecked,
            Step::StructureChecked(_) => ScanState::StructureChecked,
            Step::Rejected(_) | Step::Completed(_) => ScanState::Completed,
        }
    }
}

fn timeout_finding() -> Finding {
    Finding::new(
        TIMEOUT_RULE,
        Stage::Orchestrator,
        Severity::Warning,
        TIMEOUT_DESCRIPTION,
    )
}

/// Sequences the detectors for one request
pub struct ScanOrchestrator {
    validator: FormatValidator,
    inspector: StructuralAnomalyInspector,
    options: ScanOptions,
    stats: Arc<StatsTracker>,
    observer: Option<Arc<dyn ScanObserver>>,
}

impl ScanOrchestrator {
    pub fn new(options: ScanOptions, stats: Arc<StatsTracker>) -> Self {
        Self {
            validator: FormatValidator::new(options.max_file_size),
            inspector: StructuralAnomalyInspector::new(options.walk_limits()),
            options,
            stats,
            observer: None,
        }
    }

    pub fn set_observer(&mut self, observer: Arc<dyn ScanObserver>) {
        self.observer = Some(observer);
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Runs `request` against `detectors` to a verdict or a rejection
    ///
    /// Hostile input never produces an `Err`; the only error is
    /// [`ScanError::Cancelled`], in which case nothing is recorded.
    pub fn run(
        &self,
        request: ScanRequest<'_>,
        detectors: &DetectorSet,
        cancel: &CancelToken,
    ) -> Result<ScanOutcome> {
        let started = Instant::now();
        let mode = request.mode();
        let data = request.data();
        let budget = self.options.timeout(mode);
        let over_budget = || started.elapsed() >= budget;

        let mut findings: Vec<Finding> = Vec::new();
        let mut timed_out = false;
        let mut step = Step::Received;

        loop {
            if cancel.is_cancelled() {
                tracing::debug!(state = ?step.state(), "scan cancelled");
                return Err(ScanError::Cancelled);
            }
            let from = step.state();

            let next = match step {
                Step::Received => match self.validator.validate(data, &request.extension()) {
                    Ok(check) => {
                        findings.extend(check.extension_mismatch());
                        Step::FormatChecked(check)
                    }
                    Err(reason) => Step::Rejected(reason),
                },

                Step::FormatChecked(check) => {
                    let identity = FileIdentity {
                        mime: check.mime,
                        format: check.format,
                        digest: HashMatcher::digest(data),
                        dimensions: check.dimensions,
                        declared_extension: check.declared_extension,
                    };
                    if detectors.hashes().lookup(&identity.digest) {
                        findings = vec![HashMatcher::match_finding()];
                        Step::Completed(identity)
                    } else {
                        Step::HashChecked(identity)
                    }
                }

                Step::HashChecked(identity) if over_budget() => {
                    timed_out = true;
                    Step::Completed(identity)
                }
                Step::HashChecked(identity) => {
                    findings.extend(detectors.signatures().scan(data, identity.format, mode));
                    Step::SignatureChecked(identity)
                }

                Step::SignatureChecked(identity) if mode == ScanMode::Light => {
                    timed_out = over_budget();
                    Step::Completed(identity)
                }
                Step::SignatureChecked(identity) if over_budget() => {
                    timed_out = true;
                    Step::Completed(identity)
                }
                Step::SignatureChecked(identity) => {
                    for finding in self.inspector.inspect(data, identity.format) {
                        let covered = finding.is_critical()
                            && findings.iter().any(|f| f.rule_id == finding.rule_id);
                        if !covered {
                            findings.push(finding);
                        }
                    }
                    Step::StructureChecked(identity)
                }

                Step::StructureChecked(identity) => {
                    timed_out = over_budget();
                    Step::Completed(identity)
                }

                Step::Rejected(reason) => {
                    tracing::info!(%reason, "input rejected");
                    self.stats.record_rejection();
                    return Ok(ScanOutcome::Rejected(Rejection {
                        reason,
                        mode,
                        elapsed: started.elapsed(),
                    }));
                }

                Step::Completed(identity) => {
                    if timed_out {
                        findings.push(timeout_finding());
                    }
                    findings.sort_by(|a, b| {
                        b.severity
                            .cmp(&a.severity)
                            .then_with(|| a.rule_id.cmp(&b.rule_id))
                    });
                    let result = ScanResult::new(
                        &identity,
                        findings,
                        started.elapsed(),
                        mode,
                        detectors.version(),
                        timed_out,
                    );
                    self.log_verdict(&result);
                    self.stats.record(mode, result.verdict());
                    return Ok(ScanOutcome::Completed(result));
                }
            };

            self.transition(from, next.state());
            step = next;
        }
    }

    fn transition(&self, from: ScanState, to: ScanState) {
        tracing::debug!(?from, ?to, "scan state transition");
        if let Some(observer) = &self.observer {
            observer.on_transition(from, to);
        }
    }

    fn log_verdict(&self, result: &ScanResult) {
        let elapsed_ms = result.elapsed().as_secs_f64() * 1000.0;
        match result.verdict() {
            Verdict::Malicious => tracing::warn!(
                digest = %result.digest(),
                findings = result.findings().len(),
                elapsed_ms,
                "malicious upload"
            ),
            verdict => tracing::info!(
                %verdict,
                findings = result.findings().len(),
                elapsed_ms,
                "scan completed"
            ),
        }
        if result.timed_out() {
            tracing::warn!(
                budget_ms = self.options.timeout(result.mode()).as_millis() as u64,
                "scan stopped at time budget"
            );
        }
    }
}

impl std::fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("options", &self.options)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
