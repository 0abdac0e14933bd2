//! Repository traits (interfaces)
//!
//! Ports through which detector data enters the domain. Infrastructure
//! provides file-backed and embedded implementations.

mod hash_database;
mod rule_set;

pub use hash_database::HashDatabaseSource;
pub use rule_set::RuleSetSource;
