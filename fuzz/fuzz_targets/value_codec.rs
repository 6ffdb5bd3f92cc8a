#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let value = auditlens_report::decode_value(data);
    // List tokens never keep placeholder or empty entries.
    if matches!(value, auditlens_types::Value::List(_)) {
        for text in value.scalar_texts() {
            assert!(!text.is_empty());
            assert_ne!(text, "-");
        }
    }
});
