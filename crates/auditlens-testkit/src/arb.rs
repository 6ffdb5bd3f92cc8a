//! Proptest strategies for generating valid test inputs.

use proptest::prelude::*;

use auditlens_types::{EventScope, SilenceRule};

/// Report keys that cannot collide with derived `*_count` siblings.
pub fn arb_report_key() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,11}")
        .expect("valid regex")
        .prop_filter("must not collide with count keys", |k| {
            !k.ends_with("_count")
        })
}

/// Scalar value tokens without delimiters or placeholder characters.
pub fn arb_report_token() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9][A-Za-z0-9 ._]{0,14}")
        .expect("valid regex")
        .prop_map(|s| s.trim().to_string())
        .prop_filter("must survive codec trimming", |s| {
            !s.is_empty() && s != "-"
        })
}

pub fn arb_event_scope() -> impl Strategy<Value = EventScope> {
    prop::sample::select(&[
        EventScope::All,
        EventScope::Added,
        EventScope::Changed,
        EventScope::Removed,
    ])
}

/// Well-formed, active silence rules.
pub fn arb_silence_rule() -> impl Strategy<Value = SilenceRule> {
    (
        prop::string::string_regex("[a-z_*?]{1,12}").expect("valid regex"),
        arb_event_scope(),
        prop::string::string_regex("[a-z0-9\\-*?]{1,12}").expect("valid regex"),
    )
        .prop_map(|(key_pattern, event_type, host_pattern)| SilenceRule {
            key_pattern,
            event_type,
            host_pattern,
            is_active: true,
        })
}
