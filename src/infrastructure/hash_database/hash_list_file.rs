//! Plain-text digest list on disk
//!
//! One hex SHA-256 per line, optionally followed by a label; `#` starts a
//! comment line. This is the layout of most public malware hash feeds.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::core::HashDatabaseError;
use crate::domain::entities::MalwareHashSet;
use crate::domain::repositories::HashDatabaseSource;

/// Digest list file
#[derive(Debug, Clone)]
pub struct HashListFile {
    path: PathBuf,
}

impl HashListFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HashDatabaseSource for HashListFile {
    fn load(&self) -> Result<MalwareHashSet, HashDatabaseError> {
        let io_error = |source| HashDatabaseError::Io {
            path: self.path.clone(),
            source,
        };

        let file = File::open(&self.path).map_err(io_error)?;
        let set = MalwareHashSet::parse(BufReader::new(file)).map_err(io_error)?;

        if set.skipped_lines() > 0 {
            tracing::warn!(
                path = %self.path.display(),
                skipped = set.skipped_lines(),
                "Skipped malformed lines in hash database"
            );
        }
        tracing::info!(
            path = %self.path.display(),
            digests = set.len(),
            "Loaded malware hash database"
        );
        Ok(set)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
