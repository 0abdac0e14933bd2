//! Structural anomaly inspection service
//!
//! Full-scan-only deep walk of the container. Walk anomalies become findings;
//! a walk that cannot continue becomes one more warning, never an error.

use crate::domain::entities::{Finding, Severity, Stage};
use crate::formats::{
    self, Anomaly, AnomalyKind, ImageFormat, StructureReport, WalkError, WalkLimits,
};

pub const CORRUPT_CONTAINER_RULE: &str = "structure.corrupt-container";
pub const ENTRY_LIMIT_RULE: &str = "structure.entry-limit";

fn rule_id(kind: AnomalyKind) -> &'static str {
    match kind {
        AnomalyKind::TruncatedBlock => "structure.truncated-block",
        AnomalyKind::OversizedBlock => "structure.oversized-block",
        AnomalyKind::TrailingData => "structure.trailing-data",
        AnomalyKind::DuplicateCritical => "structure.duplicate-critical",
        AnomalyKind::NestedContainer => "structure.nested-container",
        AnomalyKind::RecursiveReference => "structure.recursive-reference",
        AnomalyKind::ChecksumMismatch => "structure.crc-mismatch",
        AnomalyKind::MissingTerminator => "structure.missing-terminator",
        AnomalyKind::KnownExploit(rule) => rule,
    }
}

impl From<Anomaly> for Finding {
    fn from(anomaly: Anomaly) -> Self {
        let severity = match anomaly.kind {
            AnomalyKind::KnownExploit(_) => Severity::Critical,
            _ => Severity::Warning,
        };
        Finding::new(rule_id(anomaly.kind), Stage::Structure, severity, anomaly.detail)
            .at(anomaly.offset)
    }
}

/// Walks container structure looking for smuggling and exploit shapes
#[derive(Debug, Clone)]
pub struct StructuralAnomalyInspector {
    limits: WalkLimits,
}

impl StructuralAnomalyInspector {
    pub fn new(limits: WalkLimits) -> Self {
        Self { limits }
    }

    /// Inspects `data` as `format`
    ///
    /// Findings are in walk order. Known-exploit structures carry the id of
    /// the signature rule that covers the same bytes so the orchestrator can
    /// deduplicate them.
    pub fn inspect(&self, data: &[u8], format: ImageFormat) -> Vec<Finding> {
        let mut report = StructureReport::new(data.len(), self.limits);
        let stopped = formats::walk(format, data, &mut report).err();

        let mut findings: Vec<Finding> =
            report.into_anomalies().into_iter().map(Finding::from).collect();

        match stopped {
            Some(WalkError::Corrupt { offset, detail }) => {
                tracing::debug!(%format, offset, %detail, "structure walk stopped");
                findings.push(
                    Finding::new(
                        CORRUPT_CONTAINER_RULE,
                        Stage::Structure,
                        Severity::Warning,
                        format!("{format} structure could not be parsed: {detail}"),
                    )
                    .at(offset),
                );
            }
            Some(WalkError::EntryLimit { offset, limit }) => {
                findings.push(
                    Finding::new(
                        ENTRY_LIMIT_RULE,
                        Stage::Structure,
                        Severity::Warning,
                        format!("{format} container has more than {limit} blocks"),
                    )
                    .at(offset),
                );
            }
            None => {}
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exploit_anomaly_is_critical_with_rule_id() {
        let finding = Finding::from(Anomaly {
            kind: AnomalyKind::KnownExploit("jpeg-com-zero-length"),
            offset: 20,
            detail: "bad COM".into(),
        });
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(finding.rule_id, "jpeg-com-zero-length");
        assert_eq!(finding.offset, Some(20));
    }

    #[test]
    fn corrupt_walk_becomes_a_warning() {
        let inspector = StructuralAnomalyInspector::new(WalkLimits::default());
        let findings = inspector.inspect(b"BM\x00\x00", ImageFormat::Bmp);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, CORRUPT_CONTAINER_RULE);
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn entry_cap_is_reported() {
        let limits = WalkLimits {
            max_entries: 1,
            ..WalkLimits::default()
        };
        let mut data = vec![0xFF, 0xD8];
        for _ in 0..3 {
            data.extend_from_slice(&[0xFF, 0xE1, 0x00, 0x04, 0x00, 0x00]);
        }
        data.extend_from_slice(&[0xFF, 0xD9]);

        let findings = StructuralAnomalyInspector::new(limits).inspect(&data, ImageFormat::Jpeg);
        assert_eq!(findings.last().unwrap().rule_id, ENTRY_LIMIT_RULE);
    }
}
