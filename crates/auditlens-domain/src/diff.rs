//! Structural diffing between two parsed reports.

use std::collections::BTreeSet;

use auditlens_types::{ChangedKey, DiffResult, ParsedReport};
use auditlens_report::parse_report;

/// Compare two raw report texts and classify every key as added, removed,
/// or changed.
///
/// Both texts are parsed independently; a parse failure on one side simply
/// anchors the diff on whichever keys did parse, so everything from the
/// other report shows up as wholly added or wholly removed.
pub fn compare_reports(old_text: &str, new_text: &str, ignore_keys: &BTreeSet<String>) -> DiffResult {
    let old = parse_report(old_text);
    let new = parse_report(new_text);
    compare_parsed(&old, &new, ignore_keys)
}

/// Compare two already-parsed reports.
///
/// Values compare as whole units with order-sensitive list equality: a list
/// field flips straight to `changed` when any element differs, rather than
/// being decomposed into per-element added/removed items. `ignore_keys` is
/// normally empty — display-time suppression belongs to the silence rules,
/// which act retroactively on stored diffs.
pub fn compare_parsed(
    old: &ParsedReport,
    new: &ParsedReport,
    ignore_keys: &BTreeSet<String>,
) -> DiffResult {
    let mut diff = DiffResult::default();

    let all_keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();

    for key in all_keys {
        if ignore_keys.contains(key.as_str()) {
            continue;
        }
        match (old.get(key), new.get(key)) {
            (None, Some(new_value)) => {
                diff.added.insert(key.clone(), new_value.clone());
            }
            (Some(old_value), None) => {
                diff.removed.insert(key.clone(), old_value.clone());
            }
            (Some(old_value), Some(new_value)) if old_value != new_value => {
                diff.changed.push(ChangedKey {
                    key: key.clone(),
                    old: old_value.clone(),
                    new: new_value.clone(),
                });
            }
            _ => {}
        }
    }

    diff
}
