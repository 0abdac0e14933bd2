//! Application layer
//!
//! Runs scans against the current detectors and keeps process-wide state.

mod detector_registry;
pub mod dto;
mod image_scanner;
mod scan_orchestrator;
mod stats_tracker;

pub use detector_registry::{DetectorRegistry, DetectorSet};
pub use image_scanner::ImageScanner;
pub use scan_orchestrator::{
    CancelToken, ScanObserver, ScanOrchestrator, ScanState, TIMEOUT_DESCRIPTION, TIMEOUT_RULE,
};
pub use stats_tracker::StatsTracker;
