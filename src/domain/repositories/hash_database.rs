//! Malware hash database port

use crate::core::HashDatabaseError;
use crate::domain::entities::MalwareHashSet;

/// Source of known-malicious digests
///
/// # Example
///
/// ```ignore
/// let source = HashListFile::new("/etc/aegis/malware.sha256");
/// let set = source.load()?;
/// ```
pub trait HashDatabaseSource: Send + Sync {
    /// Reads and parses the whole database
    fn load(&self) -> Result<MalwareHashSet, HashDatabaseError>;

    /// Human-readable origin, used in logs
    fn describe(&self) -> String;
}
