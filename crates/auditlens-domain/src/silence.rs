//! Display-time suppression of change events via silence rules.
//!
//! Rules are compiled fresh on every read and matched against each event;
//! nothing is cached against a stored diff, so editing a rule instantly
//! changes which historical events are visible.

use globset::{Glob, GlobMatcher};
use tracing::debug;

use auditlens_types::{ChangeEvent, EventScope, SilenceRule};

/// A silence rule with its glob patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledSilenceRule {
    /// `None` means the `*` wildcard (matches everything, no glob needed).
    key: Option<GlobMatcher>,
    scope: EventScope,
    host: Option<GlobMatcher>,
}

impl CompiledSilenceRule {
    /// A rule matches iff key pattern, event scope, and host pattern all
    /// accept the event. A host-scoped rule never matches an event whose
    /// hostname is unknown.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if let Some(key) = &self.key {
            if !key.is_match(&event.key) {
                return false;
            }
        }

        if !self.scope.matches(event.kind) {
            return false;
        }

        if let Some(host) = &self.host {
            match &event.hostname {
                Some(hostname) => {
                    if !host.is_match(hostname) {
                        return false;
                    }
                }
                None => return false,
            }
        }

        true
    }
}

/// Compile the active rules of a rule set.
///
/// The filter never errors: inactive rules and rules with malformed glob
/// patterns are skipped (treated as non-matching), with a debug diagnostic.
pub fn compile_silence_rules(rules: &[SilenceRule]) -> Vec<CompiledSilenceRule> {
    let mut compiled = Vec::with_capacity(rules.len());

    for rule in rules {
        if !rule.is_active {
            continue;
        }

        let key = match compile_pattern(&rule.key_pattern) {
            Ok(matcher) => matcher,
            Err(err) => {
                debug!(pattern = %rule.key_pattern, %err, "skipping silence rule with bad key pattern");
                continue;
            }
        };
        let host = match compile_pattern(&rule.host_pattern) {
            Ok(matcher) => matcher,
            Err(err) => {
                debug!(pattern = %rule.host_pattern, %err, "skipping silence rule with bad host pattern");
                continue;
            }
        };

        compiled.push(CompiledSilenceRule {
            key,
            scope: rule.event_type,
            host,
        });
    }

    compiled
}

fn compile_pattern(pattern: &str) -> Result<Option<GlobMatcher>, globset::Error> {
    if pattern == "*" {
        return Ok(None);
    }
    Glob::new(pattern).map(|glob| Some(glob.compile_matcher()))
}

/// An event is suppressed iff any compiled rule matches it. Matching
/// short-circuits on the first hit; unmatched events pass through.
pub fn is_suppressed(event: &ChangeEvent, rules: &[CompiledSilenceRule]) -> bool {
    rules.iter().any(|rule| rule.matches(event))
}

/// Check a rule's patterns without building matchers.
///
/// The runtime filter silently skips malformed rules; config validation
/// uses this to tell the operator about them instead.
pub fn validate_patterns(rule: &SilenceRule) -> Result<(), globset::Error> {
    if rule.key_pattern != "*" {
        Glob::new(&rule.key_pattern)?;
    }
    if rule.host_pattern != "*" {
        Glob::new(&rule.host_pattern)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditlens_types::EventKind;
    use chrono::Utc;

    fn event(key: &str, kind: EventKind, hostname: Option<&str>) -> ChangeEvent {
        ChangeEvent {
            hostname: hostname.map(str::to_string),
            key: key.to_string(),
            kind,
            timestamp: Utc::now(),
        }
    }

    fn rule(key_pattern: &str, event_type: EventScope, host_pattern: &str) -> SilenceRule {
        SilenceRule {
            key_pattern: key_pattern.to_string(),
            event_type,
            host_pattern: host_pattern.to_string(),
            is_active: true,
        }
    }

    #[test]
    fn full_wildcard_rule_suppresses_everything() {
        let rules = compile_silence_rules(&[rule("*", EventScope::All, "*")]);
        assert!(is_suppressed(
            &event("anything", EventKind::Added, Some("web-1")),
            &rules
        ));
        assert!(is_suppressed(&event("other", EventKind::Removed, None), &rules));
    }

    #[test]
    fn event_type_scoping_leaves_other_kinds_visible() {
        let rules = compile_silence_rules(&[rule("ssh_*", EventScope::Changed, "*")]);
        assert!(is_suppressed(
            &event("ssh_daemon", EventKind::Changed, None),
            &rules
        ));
        assert!(!is_suppressed(
            &event("ssh_daemon", EventKind::Added, None),
            &rules
        ));
        assert!(!is_suppressed(
            &event("ssh_daemon", EventKind::Removed, None),
            &rules
        ));
    }

    #[test]
    fn key_glob_is_whole_string_and_case_sensitive() {
        let rules = compile_silence_rules(&[rule("boot", EventScope::All, "*")]);
        assert!(is_suppressed(&event("boot", EventKind::Changed, None), &rules));
        assert!(!is_suppressed(
            &event("boot_loader", EventKind::Changed, None),
            &rules
        ));
        assert!(!is_suppressed(&event("Boot", EventKind::Changed, None), &rules));
    }

    #[test]
    fn question_mark_matches_a_single_character() {
        let rules = compile_silence_rules(&[rule("eth?", EventScope::All, "*")]);
        assert!(is_suppressed(&event("eth0", EventKind::Added, None), &rules));
        assert!(!is_suppressed(&event("eth10", EventKind::Added, None), &rules));
    }

    #[test]
    fn host_scoped_rule_requires_a_known_matching_hostname() {
        let rules = compile_silence_rules(&[rule("*", EventScope::All, "web-*")]);
        assert!(is_suppressed(
            &event("k", EventKind::Changed, Some("web-1")),
            &rules
        ));
        assert!(!is_suppressed(
            &event("k", EventKind::Changed, Some("db-1")),
            &rules
        ));
        // Unknown hostname never matches a host-scoped rule.
        assert!(!is_suppressed(&event("k", EventKind::Changed, None), &rules));
    }

    #[test]
    fn inactive_rules_are_skipped() {
        let mut inactive = rule("*", EventScope::All, "*");
        inactive.is_active = false;
        let rules = compile_silence_rules(&[inactive]);
        assert!(rules.is_empty());
        assert!(!is_suppressed(&event("k", EventKind::Added, None), &rules));
    }

    #[test]
    fn malformed_patterns_never_match_and_never_error() {
        let rules = compile_silence_rules(&[rule("[unclosed", EventScope::All, "*")]);
        assert!(rules.is_empty());
        assert!(!is_suppressed(&event("k", EventKind::Added, None), &rules));
    }

    #[test]
    fn first_matching_rule_wins_but_any_match_suppresses() {
        let rules = compile_silence_rules(&[
            rule("never_*", EventScope::All, "*"),
            rule("uptime_*", EventScope::All, "*"),
        ]);
        assert!(is_suppressed(
            &event("uptime_in_seconds", EventKind::Changed, None),
            &rules
        ));
        assert!(!is_suppressed(
            &event("hardening_index", EventKind::Changed, None),
            &rules
        ));
    }
}
