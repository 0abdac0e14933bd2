pub mod application;
pub mod core;
pub mod domain;
pub mod formats;
pub mod infrastructure;

pub use application::dto::ScanOptions;
pub use application::{CancelToken, ImageScanner, ScanObserver, ScanState};
pub use crate::core::{RejectionReason, ScanError};
pub use domain::entities::{
    Finding, ScanMode, ScanOutcome, ScanResult, ScannerStats, Severity, Stage, Verdict,
};
pub use formats::ImageFormat;
