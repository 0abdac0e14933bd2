//! Signature scanning service
//!
//! Evaluates the compiled rule set against the raw bytes. Rules are grouped
//! into severity tiers, critical first. Within a tier, anchored rules are a
//! direct slice comparison and floating rules share one Aho-Corasick
//! automaton, so a tier costs a single pass over the buffer regardless of how
//! many rules it holds.

use std::cmp::Reverse;
use std::collections::HashSet;

use aho_corasick::AhoCorasick;

use crate::core::RuleSetError;
use crate::domain::entities::{Alignment, Finding, ScanMode, Severity, SignatureRule, Stage};
use crate::formats::{jpeg, ImageFormat};

#[derive(Debug)]
struct Tier {
    severity: Severity,
    /// Rule indices of fixed-offset rules, in declared order
    anchored: Vec<usize>,
    /// Automaton over the floating rules' patterns
    automaton: Option<AhoCorasick>,
    /// Maps automaton pattern index to rule index
    pattern_map: Vec<usize>,
}

/// Match positions allowed by aligned rules, computed on first use per scan
struct AlignedOffsets<'a> {
    data: &'a [u8],
    jpeg_segments: Option<Vec<usize>>,
}

impl<'a> AlignedOffsets<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            jpeg_segments: None,
        }
    }

    fn accepts(&mut self, alignment: Alignment, offset: usize) -> bool {
        match alignment {
            Alignment::Anywhere => true,
            Alignment::JpegSegment => {
                let data = self.data;
                self.jpeg_segments
                    .get_or_insert_with(|| jpeg::segment_offsets(data))
                    .binary_search(&offset)
                    .is_ok()
            }
        }
    }
}

/// Compiled, immutable signature rule set
#[derive(Debug)]
pub struct SignatureScanner {
    rules: Vec<SignatureRule>,
    tiers: Vec<Tier>,
}

impl SignatureScanner {
    /// Validates and compiles rules
    ///
    /// Evaluation order is severity first (critical before warning), then
    /// declared order.
    pub fn compile(mut rules: Vec<SignatureRule>) -> Result<Self, RuleSetError> {
        if rules.is_empty() {
            return Err(RuleSetError::Empty);
        }

        let mut ids = HashSet::new();
        for (position, rule) in rules.iter().enumerate() {
            if rule.id.trim().is_empty() {
                return Err(RuleSetError::EmptyId(position));
            }
            if !ids.insert(rule.id.as_str()) {
                return Err(RuleSetError::DuplicateId(rule.id.clone()));
            }
            if rule.pattern.is_empty() {
                return Err(RuleSetError::EmptyPattern(rule.id.clone()));
            }
        }

        rules.sort_by_key(|rule| Reverse(rule.severity));

        let mut tiers = Vec::new();
        for severity in [Severity::Critical, Severity::Warning] {
            let mut anchored = Vec::new();
            let mut pattern_map = Vec::new();
            let mut patterns: Vec<&[u8]> = Vec::new();

            for (idx, rule) in rules.iter().enumerate() {
                if rule.severity != severity {
                    continue;
                }
                if rule.offset.is_some() {
                    anchored.push(idx);
                } else {
                    patterns.push(rule.pattern.as_bytes());
                    pattern_map.push(idx);
                }
            }

            let automaton = if patterns.is_empty() {
                None
            } else {
                Some(AhoCorasick::new(&patterns)?)
            };
            tiers.push(Tier {
                severity,
                anchored,
                automaton,
                pattern_map,
            });
        }

        Ok(Self { rules, tiers })
    }

    /// Scans `data` under `mode`
    ///
    /// Light mode evaluates only the critical tier and stops at the first
    /// match. Full mode evaluates every tier and reports each matching rule
    /// once, at its first offset, ordered by severity then rule id.
    pub fn scan(&self, data: &[u8], format: ImageFormat, mode: ScanMode) -> Vec<Finding> {
        match mode {
            ScanMode::Light => self.first_critical(data, format).into_iter().collect(),
            ScanMode::Full => self.exhaustive(data, format),
        }
    }

    fn first_critical(&self, data: &[u8], format: ImageFormat) -> Option<Finding> {
        let tier = self.tiers.iter().find(|t| t.severity == Severity::Critical)?;

        for &idx in &tier.anchored {
            let rule = &self.rules[idx];
            if rule.applies_to(format) && rule.matches_anchored(data) {
                return Some(self.finding(idx, rule.offset.unwrap_or(0)));
            }
        }

        let automaton = tier.automaton.as_ref()?;
        let mut aligned = AlignedOffsets::new(data);
        automaton.find_overlapping_iter(data).find_map(|m| {
            let idx = tier.pattern_map[m.pattern().as_usize()];
            let rule = &self.rules[idx];
            (rule.applies_to(format) && aligned.accepts(rule.alignment, m.start()))
                .then(|| self.finding(idx, m.start() as u64))
        })
    }

    fn exhaustive(&self, data: &[u8], format: ImageFormat) -> Vec<Finding> {
        let mut first_offsets: Vec<Option<u64>> = vec![None; self.rules.len()];
        let mut aligned = AlignedOffsets::new(data);

        for tier in &self.tiers {
            for &idx in &tier.anchored {
                let rule = &self.rules[idx];
                if rule.applies_to(format) && rule.matches_anchored(data) {
                    first_offsets[idx] = rule.offset;
                }
            }

            let Some(automaton) = &tier.automaton else {
                continue;
            };
            for m in automaton.find_overlapping_iter(data) {
                let idx = tier.pattern_map[m.pattern().as_usize()];
                let rule = &self.rules[idx];
                if first_offsets[idx].is_none()
                    && rule.applies_to(format)
                    && aligned.accepts(rule.alignment, m.start())
                {
                    first_offsets[idx] = Some(m.start() as u64);
                }
            }
        }

        let mut findings: Vec<Finding> = first_offsets
            .iter()
            .enumerate()
            .filter_map(|(idx, offset)| offset.map(|o| self.finding(idx, o)))
            .collect();
        findings.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });
        findings
    }

    fn finding(&self, idx: usize, offset: u64) -> Finding {
        let rule = &self.rules[idx];
        Finding::new(
            rule.id.clone(),
            Stage::Signature,
            rule.severity,
            rule.description.clone(),
        )
        .at(offset)
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> &[SignatureRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.rules.iter().filter(|r| r.severity == severity).count()
    }
}
