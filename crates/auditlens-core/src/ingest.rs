//! The upload pipeline: cap → parse → diff against the stored report →
//! store → summarize.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use auditlens_domain::compare_parsed;
use auditlens_report::{parse_report, REPORT_END_KEY};
use auditlens_types::{DiffResult, ParsedReport};

use crate::settings::Settings;

/// Storage seam for previously uploaded reports.
///
/// Persistence is a collaborator, not part of the core; implementations wrap
/// whatever the service actually stores reports in. The core requires its
/// caller to serialize ingest sequences **per device** (a per-device lock or
/// a transactional read-modify-write): two racing uploads for the same
/// device may otherwise diff against a stale base. Uploads for different
/// devices are safe to run fully concurrently.
pub trait ReportStore {
    /// The most recent stored report text for a device, if any.
    fn latest_report(&self, host_id: &str) -> anyhow::Result<Option<String>>;

    /// Persist a new report text as the device's latest.
    fn store_report(&mut self, host_id: &str, report_text: &str) -> anyhow::Result<()>;
}

/// In-memory store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    reports: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportStore for MemoryStore {
    fn latest_report(&self, host_id: &str) -> anyhow::Result<Option<String>> {
        Ok(self.reports.get(host_id).cloned())
    }

    fn store_report(&mut self, host_id: &str, report_text: &str) -> anyhow::Result<()> {
        self.reports.insert(host_id.to_string(), report_text.to_string());
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("report is {bytes} bytes, exceeding the {max} byte cap")]
    ReportTooLarge { bytes: usize, max: usize },

    /// The text produced no keys at all; the caller should surface a
    /// user-facing parse error rather than storing an empty report.
    #[error("report could not be parsed")]
    UnparsableReport,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Device metadata lifted from the most important report keys, the way the
/// device inventory row is refreshed on every upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub hostname: Option<String>,
    pub os: Option<String>,
    pub os_fullname: Option<String>,
    pub os_version: Option<String>,
    pub last_audit: Option<String>,
    pub warning_count: Option<i64>,
}

impl DeviceSummary {
    fn from_report(report: &ParsedReport) -> Self {
        Self {
            hostname: report.get_str("hostname").map(str::to_string),
            os: report.get_str("os").map(str::to_string),
            os_fullname: report.get_str("os_fullname").map(str::to_string),
            os_version: report.get_str("os_version").map(str::to_string),
            last_audit: report.get_str(REPORT_END_KEY).map(str::to_string),
            warning_count: report.get_i64("warning_count"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub summary: DeviceSummary,
    pub report: ParsedReport,
    /// `None` on a device's first upload; the full unfiltered diff
    /// otherwise. Persist it verbatim — suppression happens at read time.
    pub diff: Option<DiffResult>,
}

/// Ingest one uploaded report for a device.
pub fn ingest_report<S: ReportStore + ?Sized>(
    store: &mut S,
    host_id: &str,
    report_text: &str,
    settings: &Settings,
) -> Result<IngestOutcome, IngestError> {
    if report_text.len() > settings.max_report_bytes {
        return Err(IngestError::ReportTooLarge {
            bytes: report_text.len(),
            max: settings.max_report_bytes,
        });
    }

    let report = parse_report(report_text);
    if report.is_empty() {
        return Err(IngestError::UnparsableReport);
    }

    let diff = match store.latest_report(host_id)? {
        Some(previous_text) => {
            let previous = parse_report(&previous_text);
            let diff = compare_parsed(&previous, &report, &settings.ignore_keys);
            debug!(host_id, changes = diff.change_count(), "computed upload diff");
            Some(diff)
        }
        None => {
            debug!(host_id, "first report for device, nothing to diff");
            None
        }
    };

    store.store_report(host_id, report_text)?;

    let summary = DeviceSummary::from_report(&report);
    info!(host_id, hostname = ?summary.hostname, "report ingested");

    Ok(IngestOutcome {
        summary,
        report,
        diff,
    })
}
