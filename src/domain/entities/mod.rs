//! Domain entities
//!
//! Values that flow through one scan and the shared detector data they are
//! checked against.

mod file_identity;
mod finding;
mod malware_hash_set;
mod scan_request;
mod scan_result;
mod scanner_stats;
mod signature_rule;

pub use file_identity::{ContentDigest, Dimensions, FileIdentity};
pub use finding::{Finding, Severity, Stage, Verdict};
pub use malware_hash_set::MalwareHashSet;
pub use scan_request::{ScanMode, ScanRequest};
pub use scan_result::{Rejection, ScanOutcome, ScanResult};
pub use scanner_stats::ScannerStats;
pub use signature_rule::{Alignment, BytePattern, SignatureRule};
