//! Property-based tests for auditlens-report.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use auditlens_report::parse_report_at;
use auditlens_types::Value;

fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// Keys that cannot collide with derived `*_count` siblings.
fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,8}")
        .expect("valid regex")
        .prop_filter("must not collide with count keys", |k| {
            !k.ends_with("_count")
        })
}

fn token_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9]{1,8}").expect("valid regex")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Parsing is total: arbitrary input must never panic, and the result is
    // either empty or contains only keys present in the input.
    #[test]
    fn parsing_never_panics(text in ".{0,400}") {
        let _ = parse_report_at(&text, fixed_now());
    }

    // For every list-valued key k, report[k_count] == len(report[k]).
    #[test]
    fn count_keys_match_list_lengths(
        entries in prop::collection::btree_map(
            key_strategy(),
            prop::collection::vec(token_strategy(), 1..5),
            1..6,
        ),
    ) {
        let mut text = String::new();
        for (key, tokens) in &entries {
            for token in tokens {
                text.push_str(&format!("{key}[]={token}\n"));
            }
        }

        let report = parse_report_at(&text, fixed_now());

        for (key, value) in report.iter() {
            if let Value::List(items) = value {
                let count = report
                    .get(&format!("{key}_count"))
                    .and_then(Value::as_i64);
                prop_assert_eq!(
                    count,
                    Some(items.len() as i64),
                    "count key mismatch for '{}'",
                    key
                );
            }
        }
    }

    // List element order follows first-seen file order.
    #[test]
    fn list_order_is_file_order(
        key in key_strategy(),
        tokens in prop::collection::vec(token_strategy(), 1..8),
    ) {
        let mut text = String::new();
        for token in &tokens {
            text.push_str(&format!("{key}[]={token}\n"));
        }

        let report = parse_report_at(&text, fixed_now());
        let items = report.get(&key).and_then(Value::as_list).unwrap();

        let expected: Vec<String> = tokens.clone();
        let actual: Vec<String> = items
            .iter()
            .flat_map(Value::scalar_texts)
            .collect();
        prop_assert_eq!(actual, expected);
    }

    // Scalar assignment is last-writer-wins.
    #[test]
    fn scalar_overwrite_is_last_writer_wins(
        key in key_strategy(),
        values in prop::collection::vec(token_strategy(), 2..6),
    ) {
        let mut text = String::new();
        for value in &values {
            text.push_str(&format!("{key}={value}\n"));
        }

        let report = parse_report_at(&text, fixed_now());
        let last = values.last().unwrap();
        let got = report.get(&key).unwrap();
        let expected = auditlens_report::decode_value(last);
        prop_assert_eq!(got, &expected);
    }

    // The derived primary-address key is always present once anything parses.
    #[test]
    fn primary_addresses_always_derived(
        entries in prop::collection::btree_map(key_strategy(), token_strategy(), 1..5),
    ) {
        let mut text = String::new();
        for (key, value) in &entries {
            text.push_str(&format!("{key}={value}\n"));
        }

        let report = parse_report_at(&text, fixed_now());
        prop_assert!(report.get("primary_ipv4_addresses").is_some());
    }
}

// Deterministic spot-check kept alongside the properties: the duplicated-key
// map form used above cannot express a key that is both plain and listed.
#[test]
fn mixed_plain_and_list_lines_prefer_the_later_form() {
    let entries: BTreeMap<&str, &str> = BTreeMap::from([("warning", "AAA")]);
    let mut text = String::new();
    for (key, value) in entries {
        text.push_str(&format!("{key}={value}\n{key}[]=BBB\n"));
    }

    let report = parse_report_at(&text, fixed_now());
    assert_eq!(
        report.get("warning"),
        Some(&Value::List(vec![Value::from("BBB")]))
    );
}
