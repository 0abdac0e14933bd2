//! Domain services
//!
//! The four detectors. Each is mode-agnostic except the signature scanner,
//! which takes the mode as a capability value.

mod format_validator;
mod hash_matcher;
mod signature_scanner;
mod structure_inspector;

pub use format_validator::{FormatCheck, FormatValidator, EXTENSION_MISMATCH_RULE};
pub use hash_matcher::{HashMatcher, HASH_MATCH_DESCRIPTION, HASH_MATCH_RULE};
pub use signature_scanner::SignatureScanner;
pub use structure_inspector::{
    StructuralAnomalyInspector, CORRUPT_CONTAINER_RULE, ENTRY_LIMIT_RULE,
};
