#![no_main]

use libfuzzer_sys::fuzz_target;
use jsdeob::js::parse;

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        if let Ok(program) = parse(source) {
            // Untouched programs must render to their input.
            assert_eq!(program.render(), source);
        }
    }
});
