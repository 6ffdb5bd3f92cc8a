#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|source: &str| {
    // Compilation must reject garbage with an error, never a panic; anything
    // that compiles must also evaluate without panicking.
    if let Ok(query) = auditlens_domain::compile_query(source) {
        let report =
            auditlens_report::parse_report("hardening_index=65\nos=Linux\nwarning[]=W1\n");
        let _ = query.evaluate(&report);
    }
});
