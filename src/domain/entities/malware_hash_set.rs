//! Known-malicious digest set

use std::collections::HashSet;
use std::io::{self, BufRead};

use super::file_identity::ContentDigest;

/// Immutable set of SHA-256 digests of known-malicious files
///
/// Built once from a digest list and never mutated; a reload builds a new set.
#[derive(Debug, Clone, Default)]
pub struct MalwareHashSet {
    digests: HashSet<ContentDigest>,
    skipped_lines: usize,
}

impl MalwareHashSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_digests(digests: impl IntoIterator<Item = ContentDigest>) -> Self {
        Self {
            digests: digests.into_iter().collect(),
            skipped_lines: 0,
        }
    }

    /// Parses a newline-delimited digest list
    ///
    /// Each line holds 64 hex characters, optionally followed by whitespace
    /// and a free-form label. Blank lines and `#` comments are ignored.
    /// Lines that do not start with a valid digest are counted and skipped.
    pub fn parse<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut digests = HashSet::new();
        let mut skipped_lines = 0;

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let token = line.split_whitespace().next().unwrap_or_default();
            match ContentDigest::from_hex(token) {
                Some(digest) => {
                    digests.insert(digest);
                }
                None => skipped_lines += 1,
            }
        }

        Ok(Self {
            digests,
            skipped_lines,
        })
    }

    pub fn contains(&self, digest: &ContentDigest) -> bool {
        self.digests.contains(digest)
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Malformed lines dropped during parsing
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }
}
