//! Audit report parsing.
//!
//! This crate turns the `key=value` report text emitted by fleet audit
//! agents into a [`auditlens_types::ParsedReport`], including the derived
//! fields computed after the raw keys.

mod codec;
mod derived;
mod parser;

pub use codec::decode_value;
pub use derived::{
    DAYS_SINCE_AUDIT_KEY, GATEWAY_KEY, IPV4_ADDRESSES_KEY, PRIMARY_IPV4_KEY, REPORT_END_KEY,
};
pub use parser::{parse_report, parse_report_at, DEPRECATED_CHECKS};
