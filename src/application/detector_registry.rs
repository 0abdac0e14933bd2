//! Versioned detector snapshots
//!
//! Scans hold an `Arc` to the snapshot they started with. A reload builds a
//! complete new snapshot off-lock and swaps the pointer, so an in-flight scan
//! never sees half of an update.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::services::{HashMatcher, SignatureScanner};

/// Immutable detector data used by one scan
#[derive(Debug)]
pub struct DetectorSet {
    version: u64,
    hashes: HashMatcher,
    signatures: Arc<SignatureScanner>,
}

impl DetectorSet {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn hashes(&self) -> &HashMatcher {
        &self.hashes
    }

    pub fn signatures(&self) -> &SignatureScanner {
        &self.signatures
    }
}

/// Holder of the current [`DetectorSet`]
#[derive(Debug)]
pub struct DetectorRegistry {
    current: RwLock<Arc<DetectorSet>>,
}

impl DetectorRegistry {
    pub fn new(hashes: HashMatcher, signatures: SignatureScanner) -> Self {
        Self {
            current: RwLock::new(Arc::new(DetectorSet {
                version: 1,
                hashes,
                signatures: Arc::new(signatures),
            })),
        }
    }

    /// Snapshot for a scan about to start
    pub fn current(&self) -> Arc<DetectorSet> {
        Arc::clone(&self.current.read())
    }

    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    /// Replaces the hash matcher, keeping the rules; returns the new version
    pub fn swap_hashes(&self, hashes: HashMatcher) -> u64 {
        let mut current = self.current.write();
        let next = DetectorSet {
            version: current.version + 1,
            hashes,
            signatures: Arc::clone(&current.signatures),
        };
        *current = Arc::new(next);
        current.version
    }

    /// Replaces the rules, keeping the hash matcher; returns the new version
    pub fn swap_signatures(&self, signatures: SignatureScanner) -> u64 {
        let mut current = self.current.write();
        let next = DetectorSet {
            version: current.version + 1,
            hashes: current.hashes.clone(),
            signatures: Arc::new(signatures),
        };
        *current = Arc::new(next);
        current.version
    }

    /// Replaces both at once; returns the new version
    pub fn swap_all(&self, hashes: HashMatcher, signatures: SignatureScanner) -> u64 {
        let mut current = self.current.write();
        let next = DetectorSet {
            version: current.version + 1,
            hashes,
            signatures: Arc::new(signatures),
        };
        *current = Arc::new(next);
        current.version
    }
}
