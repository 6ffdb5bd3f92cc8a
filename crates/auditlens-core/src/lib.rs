//! Core engine: orchestrates parsing + diffing + filtering around the
//! storage seam.

mod activity;
mod ingest;
mod settings;

pub use activity::{events_from_diff, visible_events};
pub use ingest::{ingest_report, DeviceSummary, IngestError, IngestOutcome, MemoryStore, ReportStore};
pub use settings::Settings;
