#![no_main]

use std::sync::OnceLock;

use aegis::application::dto::ScanOptions;
use aegis::application::ImageScanner;
use aegis::domain::entities::ScanMode;
use aegis::formats::SUPPORTED_EXTENSIONS;
use aegis::infrastructure::rules::BuiltinRules;
use libfuzzer_sys::fuzz_target;

static SCANNER: OnceLock<ImageScanner> = OnceLock::new();

fuzz_target!(|data: &[u8]| {
    let scanner = SCANNER.get_or_init(|| {
        ImageScanner::from_sources(ScanOptions::default(), None, &BuiltinRules).unwrap()
    });
    let Some((&selector, body)) = data.split_first() else {
        return;
    };
    let ext = SUPPORTED_EXTENSIONS[selector as usize % SUPPORTED_EXTENSIONS.len()];
    let mode = if selector & 0x80 == 0 {
        ScanMode::Light
    } else {
        ScanMode::Full
    };
    let _ = scanner.scan(body, &format!("fuzz.{ext}"), mode);
});
