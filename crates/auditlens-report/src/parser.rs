use auditlens_types::{ParsedReport, Value};
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::codec::decode_value;
use crate::derived;

/// Deprecated check identifiers dropped before parsing.
///
/// The match is a substring test against the whole line, not just the key —
/// a line whose *value* mentions one of these identifiers is dropped too.
/// Kept that way for output compatibility with stored historical reports.
pub const DEPRECATED_CHECKS: [&str; 5] =
    ["DEB-0280", "DEB-0285", "DEB-0520", "DEB-0870", "DEB-0880"];

/// Parse report text into a [`ParsedReport`].
///
/// Parsing never fails: unusable input yields an empty report plus a logged
/// diagnostic. Callers must treat an empty result as "could not parse" and
/// surface an error instead of proceeding with it.
pub fn parse_report(text: &str) -> ParsedReport {
    parse_report_at(text, Utc::now())
}

/// [`parse_report`] with an injected clock, so `days_since_audit` is
/// deterministic under test.
pub fn parse_report_at(text: &str, now: DateTime<Utc>) -> ParsedReport {
    let mut report = ParsedReport::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if DEPRECATED_CHECKS.iter().any(|check| line.contains(check)) {
            continue;
        }
        let Some((key, raw_value)) = line.split_once('=') else {
            continue;
        };

        if let Some(base_key) = key.strip_suffix("[]") {
            // Each `key[]=` line contributes exactly one list element, even
            // when the decoded value is itself a sub-list.
            let element = decode_value(raw_value);
            match report.get_mut(base_key) {
                Some(Value::List(items)) => items.push(element),
                _ => report.insert(base_key, Value::List(vec![element])),
            }
        } else {
            // Later plain lines with the same key overwrite earlier ones.
            report.insert(key, decode_value(raw_value));
        }
    }

    // An empty map is the "could not parse" signal; deriving fields onto it
    // would hide that from callers.
    if report.is_empty() {
        if !text.trim().is_empty() {
            warn!(bytes = text.len(), "report text produced no keys");
        }
        return report;
    }

    derived::apply(&mut report, now);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn parse(text: &str) -> ParsedReport {
        parse_report_at(text, fixed_now())
    }

    #[test]
    fn parses_plain_key_value_lines() {
        let report = parse("os=Linux\nhardening_index=65\n");
        assert_eq!(report.get("os"), Some(&Value::from("Linux")));
        assert_eq!(report.get("hardening_index"), Some(&Value::Number(65)));
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let report = parse("# audit report\n\nos=Linux\n");
        assert_eq!(report.len(), 1);
        assert!(report.contains_key("os"));
    }

    #[test]
    fn lines_without_equals_are_ignored() {
        let report = parse("garbage line\nos=Linux\n");
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn splits_on_first_equals_only() {
        let report = parse("boot_loader=GRUB=2\n");
        assert_eq!(report.get("boot_loader"), Some(&Value::from("GRUB=2")));
    }

    #[test]
    fn list_suffix_accumulates_one_element_per_line() {
        let report = parse("warning[]=AAA\nwarning[]=BBB\n");
        assert_eq!(
            report.get("warning"),
            Some(&Value::List(vec![Value::from("AAA"), Value::from("BBB")]))
        );
        assert_eq!(report.get("warning_count"), Some(&Value::Number(2)));
    }

    #[test]
    fn delimited_list_line_becomes_a_sub_list_element() {
        let report = parse("details[]=sshd|cron\ndetails[]=solo\n");
        assert_eq!(
            report.get("details"),
            Some(&Value::List(vec![
                Value::List(vec![Value::from("sshd"), Value::from("cron")]),
                Value::from("solo"),
            ]))
        );
        // Two [] lines, two elements, regardless of sub-list contents.
        assert_eq!(report.get("details_count"), Some(&Value::Number(2)));
    }

    #[test]
    fn later_plain_lines_overwrite_earlier_ones() {
        let report = parse("os_version=22.04\nos_version=24.04\n");
        assert_eq!(report.get("os_version"), Some(&Value::from("24.04")));
    }

    #[test]
    fn deprecated_check_lines_are_dropped() {
        let report = parse("test_performed[]=DEB-0280\ntest_performed[]=DEB-0001\n");
        assert_eq!(
            report.get("test_performed"),
            Some(&Value::List(vec![Value::from("DEB-0001")]))
        );
    }

    #[test]
    fn deprecated_check_match_covers_the_whole_line() {
        // Substring overreach: the identifier in the *value* drops the line.
        let report = parse("notes=see DEB-0520 for details\nos=Linux\n");
        assert!(!report.contains_key("notes"));
        assert!(report.contains_key("os"));
    }

    #[test]
    fn unusable_input_yields_empty_report() {
        let report = parse("not a report at all\njust prose\n");
        assert!(report.is_empty());
    }

    #[test]
    fn empty_input_yields_empty_report() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn plain_line_after_list_lines_replaces_the_list() {
        let report = parse("warning[]=AAA\nwarning=none\n");
        assert_eq!(report.get("warning"), Some(&Value::from("none")));
        assert!(!report.contains_key("warning_count"));
    }
}
