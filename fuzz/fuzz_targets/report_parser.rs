#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing is total: no input may panic, and an empty result is the only
    // failure signal.
    let _ = auditlens_report::parse_report(data);
});
