//! End-to-end scan pipeline tests
//!
//! Drives `ImageScanner` through every path of the state machine: rejection,
//! hash short-circuit, light and full completion, timeout and cancellation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use aegis::application::dto::ScanOptions;
use aegis::application::{CancelToken, ImageScanner, ScanObserver, ScanState, TIMEOUT_RULE};
use aegis::core::{HashDatabaseError, RejectionReason, ScanError};
use aegis::domain::entities::{
    ContentDigest, MalwareHashSet, ScanMode, ScanOutcome, Severity, SignatureRule, Stage, Verdict,
};
use aegis::domain::repositories::{HashDatabaseSource, RuleSetSource};
use aegis::domain::services::HASH_MATCH_RULE;
use aegis::infrastructure::rules::BuiltinRules;
use common::{
    gif, ico, jpeg, jpeg_segment, jpeg_with, png, png_chunk, png_with, psd, tiff, webp,
};
use parking_lot::Mutex;
use rayon::prelude::*;
use rstest::*;

fn builtin_rules() -> Vec<SignatureRule> {
    BuiltinRules.load().unwrap()
}

#[fixture]
fn scanner() -> ImageScanner {
    ImageScanner::new(ScanOptions::default(), None, builtin_rules()).unwrap()
}

fn scanner_with_hashes(digests: &[ContentDigest]) -> ImageScanner {
    let set = MalwareHashSet::from_digests(digests.iter().copied());
    ImageScanner::new(ScanOptions::default(), Some(set), builtin_rules()).unwrap()
}

fn completed(outcome: ScanOutcome) -> aegis::ScanResult {
    match outcome {
        ScanOutcome::Completed(result) => result,
        ScanOutcome::Rejected(rejection) => panic!("unexpected rejection: {}", rejection.reason),
    }
}

#[derive(Default)]
struct RecordingObserver {
    transitions: Mutex<Vec<(ScanState, ScanState)>>,
}

impl ScanObserver for RecordingObserver {
    fn on_transition(&self, from: ScanState, to: ScanState) {
        self.transitions.lock().push((from, to));
    }
}

impl RecordingObserver {
    fn visited(&self) -> Vec<ScanState> {
        self.transitions.lock().iter().map(|(_, to)| *to).collect()
    }
}

// ============================================================================
// Rejections
// ============================================================================

#[rstest]
fn test_non_image_bytes_with_jpg_extension_are_rejected(scanner: ImageScanner) {
    let outcome = scanner.scan(b"0123456789", "upload.jpg", ScanMode::Full).unwrap();

    assert_eq!(
        outcome.rejection(),
        Some(&RejectionReason::MimeMismatch {
            detected: "application/octet-stream".to_string()
        })
    );
    assert!(outcome.verdict().is_none());
}

#[rstest]
fn test_empty_upload_is_rejected(scanner: ImageScanner) {
    let outcome = scanner.scan(&[], "empty.png", ScanMode::Light).unwrap();
    assert_eq!(outcome.rejection(), Some(&RejectionReason::EmptyInput));
}

#[rstest]
#[case("archive.zip")]
#[case("noextension")]
#[case("shell.php")]
fn test_unsupported_extension_is_rejected(scanner: ImageScanner, #[case] filename: &str) {
    let outcome = scanner.scan(&png(4, 4), filename, ScanMode::Full).unwrap();
    assert!(matches!(
        outcome.rejection(),
        Some(RejectionReason::UnsupportedExtension { .. })
    ));
}

#[rstest]
fn test_oversized_upload_is_rejected() {
    let options = ScanOptions::default().with_max_file_size(16);
    let scanner = ImageScanner::new(options, None, builtin_rules()).unwrap();

    let data = png(4, 4);
    let outcome = scanner.scan(&data, "big.png", ScanMode::Full).unwrap();
    assert_eq!(
        outcome.rejection(),
        Some(&RejectionReason::FileTooLarge {
            size: data.len() as u64,
            limit: 16
        })
    );
}

#[rstest]
fn test_rejection_is_counted_separately(scanner: ImageScanner) {
    scanner.scan(b"GIF89a", "short.gif", ScanMode::Full).unwrap();
    scanner.scan(b"%PDF-1.7", "doc.png", ScanMode::Light).unwrap();

    let stats = scanner.stats();
    assert_eq!(stats.rejected, 2);
    assert_eq!(stats.total_scans, 0);
    assert_eq!(stats.verdict_total(), 0);
}

// ============================================================================
// Hash Stage
// ============================================================================

#[rstest]
#[case(ScanMode::Light)]
#[case(ScanMode::Full)]
fn test_known_hash_short_circuits_to_malicious(#[case] mode: ScanMode) {
    let data = png(8, 8);
    let scanner = scanner_with_hashes(&[ContentDigest::of(&data)]);

    let result = completed(scanner.scan(&data, "avatar.png", mode).unwrap());

    assert_eq!(result.verdict(), Verdict::Malicious);
    assert_eq!(result.findings().len(), 1);
    assert_eq!(result.findings()[0].rule_id, HASH_MATCH_RULE);
    assert_eq!(result.findings()[0].stage, Stage::Hash);
    assert!(result.elapsed() < Duration::from_millis(500));
}

#[rstest]
fn test_hash_match_skips_remaining_stages() {
    let data = png(8, 8);
    let observer = Arc::new(RecordingObserver::default());
    let scanner = scanner_with_hashes(&[ContentDigest::of(&data)])
        .with_observer(Arc::clone(&observer) as Arc<dyn ScanObserver>);

    scanner.scan(&data, "avatar.png", ScanMode::Full).unwrap();

    assert_eq!(
        observer.visited(),
        vec![ScanState::FormatChecked, ScanState::Completed]
    );
}

#[rstest]
fn test_hash_match_drops_extension_warning() {
    let data = gif(2, 2);
    let scanner = scanner_with_hashes(&[ContentDigest::of(&data)]);

    let result = completed(scanner.scan(&data, "disguised.png", ScanMode::Full).unwrap());
    assert_eq!(result.findings().len(), 1);
    assert_eq!(result.findings()[0].rule_id, HASH_MATCH_RULE);
}

// ============================================================================
// Clean Files
// ============================================================================

#[rstest]
fn test_well_formed_jpeg_is_clean_in_full_mode(scanner: ImageScanner) {
    let result = completed(scanner.scan(&jpeg(), "photo.jpg", ScanMode::Full).unwrap());

    assert_eq!(result.verdict(), Verdict::Clean);
    assert!(result.findings().is_empty());
    assert_eq!(result.mime(), "image/jpeg");
    assert_eq!(result.dimensions().width, 3);
    assert_eq!(result.dimensions().height, 2);
    assert!(!result.timed_out());
}

#[rstest]
#[case(png(16, 16), "image.png")]
#[case(jpeg(), "image.jpeg")]
#[case(gif(4, 4), "image.gif")]
#[case(tiff(4, 4), "image.tiff")]
#[case(webp(4, 4), "image.webp")]
#[case(ico(4, 4), "image.ico")]
#[case(psd(4, 4), "image.psd")]
fn test_well_formed_images_are_clean_in_both_modes(
    scanner: ImageScanner,
    #[case] data: Vec<u8>,
    #[case] filename: &str,
) {
    for mode in [ScanMode::Light, ScanMode::Full] {
        let result = completed(scanner.scan(&data, filename, mode).unwrap());
        assert_eq!(result.verdict(), Verdict::Clean, "{mode} scan of {filename}");
        assert_eq!(result.mode(), mode);
    }
}

#[rstest]
fn test_spoofed_extension_is_suspicious(scanner: ImageScanner) {
    let result = completed(scanner.scan(&gif(2, 2), "picture.png", ScanMode::Light).unwrap());

    assert_eq!(result.verdict(), Verdict::Suspicious);
    assert_eq!(result.findings()[0].rule_id, "format.extension-mismatch");
}

// ============================================================================
// Light vs Full
// ============================================================================

#[rstest]
fn test_trailing_data_only_found_in_full_mode(scanner: ImageScanner) {
    let mut data = png(16, 16);
    data.extend_from_slice(b"HELLO TRAILER");

    let full = completed(scanner.scan(&data, "trailer.png", ScanMode::Full).unwrap());
    assert!(full.verdict() >= Verdict::Suspicious);
    assert!(full
        .findings()
        .iter()
        .any(|f| f.rule_id == "structure.trailing-data" && f.stage == Stage::Structure));

    let light = completed(scanner.scan(&data, "trailer.png", ScanMode::Light).unwrap());
    assert_eq!(light.verdict(), Verdict::Clean);
    assert!(light.findings().is_empty());
}

#[rstest]
fn test_light_mode_never_enters_structure_stage() {
    let observer = Arc::new(RecordingObserver::default());
    let scanner = ImageScanner::new(ScanOptions::default(), None, builtin_rules())
        .unwrap()
        .with_observer(Arc::clone(&observer) as Arc<dyn ScanObserver>);

    scanner.scan(&png(4, 4), "a.png", ScanMode::Light).unwrap();
    assert_eq!(
        observer.visited(),
        vec![
            ScanState::FormatChecked,
            ScanState::HashChecked,
            ScanState::SignatureChecked,
            ScanState::Completed,
        ]
    );

    observer.transitions.lock().clear();
    scanner.scan(&png(4, 4), "a.png", ScanMode::Full).unwrap();
    assert_eq!(
        observer.visited(),
        vec![
            ScanState::FormatChecked,
            ScanState::HashChecked,
            ScanState::SignatureChecked,
            ScanState::StructureChecked,
            ScanState::Completed,
        ]
    );
}

#[rstest]
fn test_rejection_goes_straight_to_completed() {
    let observer = Arc::new(RecordingObserver::default());
    let scanner = ImageScanner::new(ScanOptions::default(), None, builtin_rules())
        .unwrap()
        .with_observer(Arc::clone(&observer) as Arc<dyn ScanObserver>);

    scanner.scan(b"plain text", "notes.png", ScanMode::Full).unwrap();

    assert_eq!(
        *observer.transitions.lock(),
        vec![(ScanState::Received, ScanState::Completed)]
    );
}

#[rstest]
fn test_light_mode_reports_only_first_critical(scanner: ImageScanner) {
    let mut payload = b"pad<?php system($_GET['c']); ?>".to_vec();
    payload.extend_from_slice(&[0x7F, b'E', b'L', b'F', 2, 1, 1]);
    let data = png_with(8, 8, &[png_chunk(b"tEXt", &payload)]);

    let light = completed(scanner.scan(&data, "shell.png", ScanMode::Light).unwrap());
    assert_eq!(light.verdict(), Verdict::Malicious);
    assert_eq!(light.findings().len(), 1);
    assert_eq!(light.findings()[0].rule_id, "php-open-tag");

    let full = completed(scanner.scan(&data, "shell.png", ScanMode::Full).unwrap());
    let ids: Vec<&str> = full.findings().iter().map(|f| f.rule_id.as_str()).collect();
    assert!(ids.contains(&"php-open-tag"));
    assert!(ids.contains(&"elf64-header"));
}

#[rstest]
fn test_full_findings_are_sorted_by_severity_then_rule(scanner: ImageScanner) {
    let payload = b"<script>alert(1)</script> PK\x03\x04 <?php".to_vec();
    let mut data = png_with(8, 8, &[png_chunk(b"zTXt", &payload)]);
    data.extend_from_slice(b"%PDF-1.4");

    let result = completed(scanner.scan(&data, "poly.png", ScanMode::Full).unwrap());
    let findings = result.findings();

    assert_eq!(findings[0].severity, Severity::Critical);
    for pair in findings.windows(2) {
        assert!(
            pair[0].severity > pair[1].severity
                || (pair[0].severity == pair[1].severity && pair[0].rule_id <= pair[1].rule_id)
        );
    }
}

#[rstest]
fn test_com_exploit_reported_once_across_stages(scanner: ImageScanner) {
    let data = jpeg_with(&[0xFF, 0xFE, 0x00, 0x00]);

    let result = completed(scanner.scan(&data, "gdi.jpg", ScanMode::Full).unwrap());

    assert_eq!(result.verdict(), Verdict::Malicious);
    let hits = result
        .findings()
        .iter()
        .filter(|f| f.rule_id == "jpeg-com-zero-length")
        .count();
    assert_eq!(hits, 1);
    assert!(result
        .findings()
        .iter()
        .any(|f| f.rule_id == "structure.corrupt-container"));
}

#[rstest]
fn test_com_bytes_inside_metadata_payload_are_clean(scanner: ImageScanner) {
    let mut xmp = b"http://ns.adobe.com/xap/1.0/\0<x:xmpmeta>".to_vec();
    xmp.extend_from_slice(&[0xFF, 0xFE, 0x00, 0x00, 0xFF, 0xFE, 0x00, 0x01]);
    xmp.extend_from_slice(b"</x:xmpmeta>");
    let data = jpeg_with(&jpeg_segment(0xE1, &xmp));

    for mode in [ScanMode::Light, ScanMode::Full] {
        let result = completed(scanner.scan(&data, "photo.jpg", mode).unwrap());
        assert_eq!(result.verdict(), Verdict::Clean, "{mode} scan");
        assert!(result.findings().is_empty(), "{:?}", result.findings());
    }
}

#[rstest]
fn test_com_exploit_detected_in_light_mode(scanner: ImageScanner) {
    let data = jpeg_with(&[0xFF, 0xFE, 0x00, 0x01]);

    let result = completed(scanner.scan(&data, "gdi.jpg", ScanMode::Light).unwrap());

    assert_eq!(result.verdict(), Verdict::Malicious);
    assert_eq!(result.findings().len(), 1);
    assert_eq!(result.findings()[0].rule_id, "jpeg-com-length-one");
}

// ============================================================================
// Timeout & Cancellation
// ============================================================================

#[rstest]
#[case(ScanMode::Light)]
#[case(ScanMode::Full)]
fn test_exhausted_budget_yields_timeout_warning(#[case] mode: ScanMode) {
    let options = ScanOptions::default().with_timeouts(Duration::ZERO, Duration::ZERO);
    let scanner = ImageScanner::new(options, None, builtin_rules()).unwrap();

    let result = completed(scanner.scan(&png(4, 4), "slow.png", mode).unwrap());

    assert!(result.timed_out());
    assert_eq!(result.verdict(), Verdict::Suspicious);
    assert_eq!(result.findings().len(), 1);
    assert_eq!(result.findings()[0].rule_id, TIMEOUT_RULE);
    assert_eq!(result.findings()[0].stage, Stage::Orchestrator);
}

/// Stalls the pipeline after a given state, simulating a slow final stage
struct StallAfter {
    state: ScanState,
    delay: Duration,
}

impl ScanObserver for StallAfter {
    fn on_transition(&self, _from: ScanState, to: ScanState) {
        if to == self.state {
            std::thread::sleep(self.delay);
        }
    }
}

#[rstest]
#[case(ScanMode::Light, ScanState::SignatureChecked)]
#[case(ScanMode::Full, ScanState::StructureChecked)]
fn test_budget_overrun_in_last_stage_is_a_timeout(
    #[case] mode: ScanMode,
    #[case] last_stage: ScanState,
) {
    let budget = Duration::from_millis(200);
    let options = ScanOptions::default().with_timeouts(budget, budget);
    let scanner = ImageScanner::new(options, None, builtin_rules())
        .unwrap()
        .with_observer(Arc::new(StallAfter {
            state: last_stage,
            delay: budget * 2,
        }));
    let mut data = png(16, 16);
    data.extend_from_slice(b"HELLO TRAILER");

    let result = completed(scanner.scan(&data, "slow.png", mode).unwrap());

    assert!(result.timed_out());
    assert!(result.verdict() >= Verdict::Suspicious);
    assert!(result
        .findings()
        .iter()
        .any(|f| f.rule_id == TIMEOUT_RULE && f.stage == Stage::Orchestrator));
    if mode == ScanMode::Full {
        assert!(result
            .findings()
            .iter()
            .any(|f| f.rule_id == "structure.trailing-data"));
    }
}

#[rstest]
fn test_timeout_keeps_hash_verdict() {
    let data = png(4, 4);
    let options = ScanOptions::default().with_timeouts(Duration::ZERO, Duration::ZERO);
    let set = MalwareHashSet::from_digests([ContentDigest::of(&data)]);
    let scanner = ImageScanner::new(options, Some(set), builtin_rules()).unwrap();

    let result = completed(scanner.scan(&data, "known.png", ScanMode::Full).unwrap());
    assert_eq!(result.verdict(), Verdict::Malicious);
    assert!(!result.timed_out());
}

#[rstest]
fn test_cancelled_scan_records_nothing(scanner: ImageScanner) {
    let token = CancelToken::new();
    token.cancel();

    let err = scanner
        .scan_with_cancel(&png(4, 4), "a.png", ScanMode::Full, &token)
        .unwrap_err();

    assert!(matches!(err, ScanError::Cancelled));
    let stats = scanner.stats();
    assert_eq!(stats.total_scans, 0);
    assert_eq!(stats.rejected, 0);
}

#[rstest]
fn test_cancel_from_observer_stops_at_next_boundary() {
    struct CancelAfterFormat(CancelToken);

    impl ScanObserver for CancelAfterFormat {
        fn on_transition(&self, _from: ScanState, to: ScanState) {
            if to == ScanState::FormatChecked {
                self.0.cancel();
            }
        }
    }

    let token = CancelToken::new();
    let scanner = ImageScanner::new(ScanOptions::default(), None, builtin_rules())
        .unwrap()
        .with_observer(Arc::new(CancelAfterFormat(token.clone())));

    let result = scanner.scan_with_cancel(&png(4, 4), "a.png", ScanMode::Light, &token);
    assert!(matches!(result, Err(ScanError::Cancelled)));
}

// ============================================================================
// Detector Reload
// ============================================================================

struct StaticHashes(Vec<ContentDigest>);

impl HashDatabaseSource for StaticHashes {
    fn load(&self) -> Result<MalwareHashSet, HashDatabaseError> {
        Ok(MalwareHashSet::from_digests(self.0.iter().copied()))
    }

    fn describe(&self) -> String {
        format!("{} static digests", self.0.len())
    }
}

struct BrokenHashes;

impl HashDatabaseSource for BrokenHashes {
    fn load(&self) -> Result<MalwareHashSet, HashDatabaseError> {
        Err(HashDatabaseError::Io {
            path: "/nonexistent/hashes.txt".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        })
    }

    fn describe(&self) -> String {
        "broken".to_string()
    }
}

#[rstest]
fn test_hash_reload_applies_to_new_scans(scanner: ImageScanner) {
    let data = png(8, 8);
    let before = completed(scanner.scan(&data, "x.png", ScanMode::Light).unwrap());
    assert_eq!(before.verdict(), Verdict::Clean);
    assert_eq!(before.detector_version(), 1);

    let version = scanner
        .reload_hashes(&StaticHashes(vec![ContentDigest::of(&data)]))
        .unwrap();
    assert_eq!(version, 2);

    let after = completed(scanner.scan(&data, "x.png", ScanMode::Light).unwrap());
    assert_eq!(after.verdict(), Verdict::Malicious);
    assert_eq!(after.detector_version(), 2);
    assert_eq!(scanner.stats().detector_version, 2);
}

#[rstest]
fn test_failed_reload_keeps_current_detectors() {
    let data = png(8, 8);
    let scanner = scanner_with_hashes(&[ContentDigest::of(&data)]);

    assert!(scanner.reload_hashes(&BrokenHashes).is_err());
    assert!(scanner.reload_from(&BrokenHashes, &BuiltinRules).is_err());
    assert_eq!(scanner.detector_version(), 1);

    let result = completed(scanner.scan(&data, "x.png", ScanMode::Light).unwrap());
    assert_eq!(result.verdict(), Verdict::Malicious);
}

#[rstest]
fn test_rule_reload_bumps_version(scanner: ImageScanner) {
    let count = scanner.rule_count();
    assert_eq!(scanner.reload_rules(&BuiltinRules).unwrap(), 2);
    assert_eq!(scanner.reload_from(&StaticHashes(Vec::new()), &BuiltinRules).unwrap(), 3);
    assert_eq!(scanner.rule_count(), count);
}

// ============================================================================
// Concurrency
// ============================================================================

#[rstest]
fn test_parallel_scans_are_all_counted(scanner: ImageScanner) {
    let clean = png(8, 8);
    let mut trailer = png(8, 8);
    trailer.extend_from_slice(b"appended");

    (0..64usize).into_par_iter().for_each(|i| {
        let (data, mode) = match i % 4 {
            0 => (&clean, ScanMode::Light),
            1 => (&clean, ScanMode::Full),
            2 => (&trailer, ScanMode::Light),
            _ => (&trailer, ScanMode::Full),
        };
        scanner.scan(data, "p.png", mode).unwrap();
    });

    let stats = scanner.stats();
    assert_eq!(stats.total_scans, 64);
    assert_eq!(stats.light_scans, 32);
    assert_eq!(stats.full_scans, 32);
    assert_eq!(stats.clean, 48);
    assert_eq!(stats.suspicious, 16);
    assert_eq!(stats.verdict_total(), stats.total_scans);
}

#[rstest]
fn test_reload_during_scans_is_safe(scanner: ImageScanner) {
    let data = png(8, 8);

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..50 {
                    let result = completed(scanner.scan(&data, "r.png", ScanMode::Full).unwrap());
                    assert!(result.detector_version() >= 1);
                }
            });
        }
        s.spawn(|| {
            for _ in 0..10 {
                scanner.reload_hashes(&StaticHashes(Vec::new())).unwrap();
            }
        });
    });

    assert_eq!(scanner.detector_version(), 11);
    assert_eq!(scanner.stats().total_scans, 200);
}
