//! Infrastructure layer
//!
//! Concrete implementations of the domain repositories: the digest list
//! reader and the rule set loaders.

pub mod hash_database;
pub mod rules;
