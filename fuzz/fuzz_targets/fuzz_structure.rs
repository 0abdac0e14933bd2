#![no_main]

use aegis::domain::services::StructuralAnomalyInspector;
use aegis::formats::{ImageFormat, WalkLimits};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let inspector = StructuralAnomalyInspector::new(WalkLimits::default());
    for format in ImageFormat::ALL {
        let _ = inspector.inspect(data, format);
    }
});
