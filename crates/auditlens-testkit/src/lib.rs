//! Shared test utilities for the auditlens workspace.
//!
//! - **fixtures**: sample report texts and a line-oriented report builder
//! - **arb**: proptest strategies for report keys, values, and silence rules

pub mod arb;
pub mod fixtures;

pub use arb::{arb_event_scope, arb_report_key, arb_report_token, arb_silence_rule};
pub use fixtures::{ReportBuilder, SAMPLE_REPORT, SAMPLE_REPORT_UPDATED};
