//! Image scanner facade
//!
//! The entry point callers hold for the life of the process: owns the
//! detector registry, the stats tracker and the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use crate::application::detector_registry::DetectorRegistry;
use crate::application::dto::ScanOptions;
use crate::application::scan_orchestrator::{CancelToken, ScanObserver, ScanOrchestrator};
use crate::application::stats_tracker::StatsTracker;
use crate::core::{HashDatabaseError, Result, RuleSetError};
use crate::domain::entities::{
    MalwareHashSet, Rejection, ScanMode, ScanOutcome, ScanRequest, ScannerStats, SignatureRule,
};
use crate::domain::repositories::{HashDatabaseSource, RuleSetSource};
use crate::domain::services::{HashMatcher, SignatureScanner};

/// Thread-safe scanning core
///
/// # Example
///
/// ```
/// use aegis::application::ImageScanner;
/// use aegis::application::dto::ScanOptions;
/// use aegis::domain::entities::ScanMode;
/// use aegis::infrastructure::rules::BuiltinRules;
///
/// let scanner =
///     ImageScanner::from_sources(ScanOptions::default(), None, &BuiltinRules).unwrap();
/// let outcome = scanner.scan(b"not an image", "cat.jpg", ScanMode::Light).unwrap();
/// assert!(outcome.rejection().is_some());
/// ```
#[derive(Debug)]
pub struct ImageScanner {
    orchestrator: ScanOrchestrator,
    detectors: DetectorRegistry,
    stats: Arc<StatsTracker>,
}

impl ImageScanner {
    /// Builds a scanner from already-loaded detector data
    ///
    /// `None` for `hashes` runs with a degraded hash matcher. An invalid
    /// rule set is fatal.
    pub fn new(
        options: ScanOptions,
        hashes: Option<MalwareHashSet>,
        rules: Vec<SignatureRule>,
    ) -> Result<Self> {
        options.validate()?;
        let signatures = SignatureScanner::compile(rules)?;
        let matcher = match hashes {
            Some(set) => HashMatcher::new(Arc::new(set)),
            None => {
                tracing::warn!("No malware hash database; hash matching is disabled");
                HashMatcher::degraded()
            }
        };
        tracing::info!(
            rules = signatures.len(),
            digests = matcher.known_digests(),
            "Scanner ready"
        );

        let stats = Arc::new(StatsTracker::new());
        Ok(Self {
            orchestrator: ScanOrchestrator::new(options, Arc::clone(&stats)),
            detectors: DetectorRegistry::new(matcher, signatures),
            stats,
        })
    }

    /// Builds a scanner by loading detector data from its sources
    ///
    /// A hash database that cannot be read degrades to no hash matching with
    /// a warning; a rule set that cannot be loaded is fatal.
    pub fn from_sources(
        options: ScanOptions,
        hashes: Option<&dyn HashDatabaseSource>,
        rules: &dyn RuleSetSource,
    ) -> Result<Self> {
        let hash_set = hashes.and_then(|source| match source.load() {
            Ok(set) => Some(set),
            Err(e) => {
                tracing::warn!(
                    source = %source.describe(),
                    error = %e,
                    "Hash database unavailable; hash matching is disabled"
                );
                None
            }
        });
        let rule_list = rules.load()?;
        tracing::info!(source = %rules.describe(), rules = rule_list.len(), "Loaded rule set");
        Self::new(options, hash_set, rule_list)
    }

    /// Registers an instrumentation hook for state transitions
    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.orchestrator.set_observer(observer);
        self
    }

    /// Scans one upload
    ///
    /// Rejections are returned as [`ScanOutcome::Rejected`], never as `Err`.
    pub fn scan(&self, data: &[u8], filename: &str, mode: ScanMode) -> Result<ScanOutcome> {
        self.scan_with_cancel(data, filename, mode, &CancelToken::new())
    }

    /// Scans one upload, aborting at the next stage boundary once `cancel` fires
    pub fn scan_with_cancel(
        &self,
        data: &[u8],
        filename: &str,
        mode: ScanMode,
        cancel: &CancelToken,
    ) -> Result<ScanOutcome> {
        let _span =
            tracing::info_span!("scan", %mode, file = filename, bytes = data.len()).entered();

        let request = match ScanRequest::new(data, filename, mode) {
            Ok(request) => request,
            Err(reason) => {
                self.stats.record_rejection();
                return Ok(ScanOutcome::Rejected(Rejection {
                    reason,
                    mode,
                    elapsed: Duration::ZERO,
                }));
            }
        };

        let detectors = self.detectors.current();
        self.orchestrator.run(request, &detectors, cancel)
    }

    /// Point-in-time copy of the scan counters
    pub fn stats(&self) -> ScannerStats {
        let mut stats = self.stats.snapshot();
        stats.detector_version = self.detectors.version();
        stats
    }

    /// Loads a new hash database and swaps it in; returns the new version
    ///
    /// On failure the current database stays in effect.
    pub fn reload_hashes(
        &self,
        source: &dyn HashDatabaseSource,
    ) -> std::result::Result<u64, HashDatabaseError> {
        let set = source.load()?;
        let version = self.detectors.swap_hashes(HashMatcher::new(Arc::new(set)));
        tracing::info!(source = %source.describe(), version, "Swapped hash database");
        Ok(version)
    }

    /// Loads and compiles a new rule set and swaps it in; returns the new version
    ///
    /// On failure the current rules stay in effect.
    pub fn reload_rules(
        &self,
        source: &dyn RuleSetSource,
    ) -> std::result::Result<u64, RuleSetError> {
        let signatures = SignatureScanner::compile(source.load()?)?;
        let version = self.detectors.swap_signatures(signatures);
        tracing::info!(source = %source.describe(), version, "Swapped rule set");
        Ok(version)
    }

    /// Reloads both databases as one swap; nothing changes unless both load
    pub fn reload_from(
        &self,
        hashes: &dyn HashDatabaseSource,
        rules: &dyn RuleSetSource,
    ) -> Result<u64> {
        let set = hashes.load()?;
        let signatures = SignatureScanner::compile(rules.load()?)?;
        let version = self
            .detectors
            .swap_all(HashMatcher::new(Arc::new(set)), signatures);
        tracing::info!(version, "Swapped detectors");
        Ok(version)
    }

    pub fn detector_version(&self) -> u64 {
        self.detectors.version()
    }

    pub fn rule_count(&self) -> usize {
        self.detectors.current().signatures().len()
    }

    pub fn options(&self) -> &ScanOptions {
        self.orchestrator.options()
    }
}
