//! Finding entity
//!
//! One issue reported by one stage, and the verdict derived from a set of them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a finding or a signature rule
///
/// Ordered so that `Critical > Warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        })
    }
}

/// Pipeline stage that produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Format,
    Hash,
    Signature,
    Structure,
    Orchestrator,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Stage::Format => "format",
            Stage::Hash => "hash",
            Stage::Signature => "signature",
            Stage::Structure => "structure",
            Stage::Orchestrator => "orchestrator",
        })
    }
}

/// Final classification of a completed scan
///
/// Ordered by badness: `Clean < Suspicious < Malicious`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Clean,
    Suspicious,
    Malicious,
}

impl Verdict {
    /// Verdict implied by the highest severity present
    pub fn from_findings(findings: &[Finding]) -> Self {
        match findings.iter().map(|f| f.severity).max() {
            Some(Severity::Critical) => Verdict::Malicious,
            Some(Severity::Warning) => Verdict::Suspicious,
            None => Verdict::Clean,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Verdict::Clean => "clean",
            Verdict::Suspicious => "suspicious",
            Verdict::Malicious => "malicious",
        })
    }
}

/// A single detector result
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Finding {
    /// Rule or check identifier
    pub rule_id: String,
    pub stage: Stage,
    pub severity: Severity,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

impl Finding {
    pub fn new(
        rule_id: impl Into<String>,
        stage: Stage,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            stage,
            severity,
            description: description.into(),
            offset: None,
        }
    }

    /// Attaches the byte offset the finding refers to
    pub fn at(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.rule_id, self.description)?;
        if let Some(offset) = self.offset {
            write!(f, " (offset {offset})")?;
        }
        Ok(())
    }
}
