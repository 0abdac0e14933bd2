#![no_main]

use aegis::domain::services::SignatureScanner;
use aegis::infrastructure::rules::parse_rule_document;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(rules) = parse_rule_document(text) {
        let _ = SignatureScanner::compile(rules);
    }
});
