#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        // The full parse + analyze front half should never panic.
        if let Ok(unit) = pfx_parser::parse(source) {
            let _ = pfx_analysis::analyze(unit);
        }
    }
});
