//! The activity read path: stored diffs become change events, which pass
//! through the silence rules at display time.

use chrono::{DateTime, Utc};

use auditlens_domain::{compile_silence_rules, is_suppressed};
use auditlens_types::{ChangeEvent, DiffResult, EventKind, SilenceRule};

/// Expand a stored diff into one change event per affected key.
pub fn events_from_diff(
    hostname: Option<&str>,
    recorded_at: DateTime<Utc>,
    diff: &DiffResult,
) -> Vec<ChangeEvent> {
    let mut events = Vec::with_capacity(diff.change_count());

    let event = |key: &str, kind: EventKind| ChangeEvent {
        hostname: hostname.map(str::to_string),
        key: key.to_string(),
        kind,
        timestamp: recorded_at,
    };

    for key in diff.added.keys() {
        events.push(event(key, EventKind::Added));
    }
    for key in diff.removed.keys() {
        events.push(event(key, EventKind::Removed));
    }
    for change in &diff.changed {
        events.push(event(&change.key, EventKind::Changed));
    }

    events
}

/// Filter events through the organization's silence rules.
///
/// Rules are compiled fresh on every call — deliberately: the stored events
/// are immutable, and re-reading the current rule set is what makes rule
/// edits retroactive.
pub fn visible_events(events: &[ChangeEvent], rules: &[SilenceRule]) -> Vec<ChangeEvent> {
    let compiled = compile_silence_rules(rules);
    events
        .iter()
        .filter(|event| !is_suppressed(event, &compiled))
        .cloned()
        .collect()
}
