#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use auditlens_domain::{compile_silence_rules, is_suppressed};
use auditlens_types::{ChangeEvent, EventKind, EventScope, SilenceRule};

#[derive(Arbitrary, Debug)]
struct Input {
    key_pattern: String,
    host_pattern: String,
    key: String,
    hostname: Option<String>,
}

fuzz_target!(|input: Input| {
    // The filter never errors: malformed patterns are skipped, and matching
    // arbitrary events must not panic.
    let rules = compile_silence_rules(&[SilenceRule {
        key_pattern: input.key_pattern,
        event_type: EventScope::All,
        host_pattern: input.host_pattern,
        is_active: true,
    }]);

    let event = ChangeEvent {
        hostname: input.hostname,
        key: input.key,
        kind: EventKind::Changed,
        timestamp: chrono::Utc::now(),
    };
    let _ = is_suppressed(&event, &rules);
});
