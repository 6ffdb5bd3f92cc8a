//! Derived fields computed after the raw keys: primary IPv4 addresses,
//! audit age, then list counts. Running after the raw pass means a raw key
//! can never clobber a derived one; counting last keeps the `{k}_count`
//! invariant true for derived lists as well.

use auditlens_types::{ParsedReport, Value};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

pub const GATEWAY_KEY: &str = "default_gateway";
pub const IPV4_ADDRESSES_KEY: &str = "network_ipv4_address";
pub const PRIMARY_IPV4_KEY: &str = "primary_ipv4_addresses";
pub const REPORT_END_KEY: &str = "report_datetime_end";
pub const DAYS_SINCE_AUDIT_KEY: &str = "days_since_audit";

const COUNT_SUFFIX: &str = "_count";

pub fn apply(report: &mut ParsedReport, now: DateTime<Utc>) {
    report.insert(PRIMARY_IPV4_KEY, primary_ipv4_addresses(report));

    if let Some(days) = days_since_audit(report, now) {
        report.insert(DAYS_SINCE_AUDIT_KEY, days);
    }

    let counts: Vec<(String, i64)> = report
        .iter()
        .filter_map(|(key, value)| {
            value
                .as_list()
                .map(|items| (format!("{key}{COUNT_SUFFIX}"), items.len() as i64))
        })
        .collect();
    for (key, count) in counts {
        report.insert(key, count);
    }
}

/// Addresses sharing a /24 prefix with any default gateway; all addresses
/// when no gateway is known; `["-"]` when no addresses exist at all.
fn primary_ipv4_addresses(report: &ParsedReport) -> Value {
    let addresses: Vec<String> = report
        .get(IPV4_ADDRESSES_KEY)
        .map(Value::scalar_texts)
        .unwrap_or_default();
    if addresses.is_empty() {
        return Value::List(vec![Value::from("-")]);
    }

    let gateways: Vec<String> = report
        .get(GATEWAY_KEY)
        .map(Value::scalar_texts)
        .unwrap_or_default();
    if gateways.is_empty() {
        return Value::List(addresses.into_iter().map(Value::Text).collect());
    }

    let mut primary = Vec::new();
    for gateway in &gateways {
        let Some(prefix) = slash24_prefix(gateway) else {
            continue;
        };
        for address in &addresses {
            if slash24_prefix(address) == Some(prefix) {
                primary.push(Value::Text(address.clone()));
            }
        }
    }
    Value::List(primary)
}

/// The first three dotted octets of an IPv4 address, or `None` when the
/// string does not have four parts.
fn slash24_prefix(address: &str) -> Option<&str> {
    let (prefix, rest) = address.rsplit_once('.')?;
    if rest.is_empty() || prefix.split('.').count() != 3 {
        return None;
    }
    Some(prefix)
}

/// Whole days between `now` and the report end timestamp, clamped to 0 when
/// the timestamp is in the future (clock skew). `None` — and no derived key —
/// when the timestamp is missing or unparsable.
fn days_since_audit(report: &ParsedReport, now: DateTime<Utc>) -> Option<i64> {
    let raw = report.get_str(REPORT_END_KEY)?;
    let Some(end) = parse_report_timestamp(raw) else {
        debug!(value = raw, "unable to parse report end timestamp");
        return None;
    };
    let elapsed = now.signed_duration_since(end);
    if elapsed < chrono::Duration::zero() {
        return Some(0);
    }
    Some(elapsed.num_days())
}

/// Accepts the agent's space-separated timestamp (`2024-01-15 10:30:00`,
/// taken as UTC) and full RFC 3339 date-times with an offset; a trailing
/// `Z` means UTC.
fn parse_report_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        return None;
    }
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(candidate) {
        return Some(with_offset.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(candidate, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
