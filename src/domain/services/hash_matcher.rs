//! Hash matching service

use std::sync::Arc;

use crate::domain::entities::{ContentDigest, Finding, MalwareHashSet, Severity, Stage};

pub const HASH_MATCH_RULE: &str = "hash.known-malicious";
pub const HASH_MATCH_DESCRIPTION: &str = "known-malicious content hash match";

/// Exact-match lookup against the known-malicious digest set
#[derive(Debug, Clone)]
pub struct HashMatcher {
    known: Arc<MalwareHashSet>,
    degraded: bool,
}

impl HashMatcher {
    pub fn new(known: Arc<MalwareHashSet>) -> Self {
        Self {
            known,
            degraded: false,
        }
    }

    /// A matcher with no database: every lookup misses
    pub fn degraded() -> Self {
        Self {
            known: Arc::new(MalwareHashSet::empty()),
            degraded: true,
        }
    }

    /// Computes the digest the database is keyed by
    pub fn digest(data: &[u8]) -> ContentDigest {
        ContentDigest::of(data)
    }

    pub fn lookup(&self, digest: &ContentDigest) -> bool {
        self.known.contains(digest)
    }

    /// The single finding a hash match reduces a scan to
    pub fn match_finding() -> Finding {
        Finding::new(
            HASH_MATCH_RULE,
            Stage::Hash,
            Severity::Critical,
            HASH_MATCH_DESCRIPTION,
        )
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn known_digests(&self) -> usize {
        self.known.len()
    }
}
