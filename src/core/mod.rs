//! Crate-wide error taxonomy.

pub mod error;

pub use error::{HashDatabaseError, RejectionReason, Result, RuleSetError, ScanError};
