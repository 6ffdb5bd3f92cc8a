//! Data types (values, diffs, config) for auditlens.
//!
//! This crate is intentionally "dumb": pure DTOs with serde + schemars.
//! Parsing, diffing, and evaluation live in `auditlens-report` and
//! `auditlens-domain`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Frozen Vocabulary ──────────────────────────────────────────
// Event kind tokens (snake_case), stable across the activity wire format.
pub const EVENT_ADDED: &str = "added";
pub const EVENT_CHANGED: &str = "changed";
pub const EVENT_REMOVED: &str = "removed";

/// Default cap on raw report size, applied before parsing.
pub const DEFAULT_MAX_REPORT_BYTES: usize = 4 * 1024 * 1024;

// ── Report values ──────────────────────────────────────────────

/// A single decoded report value.
///
/// Duck-typed in the source format: the same key may carry text, an integer,
/// or a delimited list from one upload to the next. Coercion of all-digit
/// scalars to `Number` happens once, in the codec, so magnitude comparisons
/// behave correctly downstream.
///
/// Serializes untagged: a plain JSON number, string, or array. List elements
/// are themselves `Value`s because a `key[]=a|b` line contributes a single
/// element that is a sub-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(i64),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Numeric view of a scalar: a `Number`, or a `Text` consisting solely
    /// of ASCII digits (tolerating one leading `-`).
    pub fn coerce_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => {
                let digits = s.strip_prefix('-').unwrap_or(s);
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                    s.parse().ok()
                } else {
                    None
                }
            }
            Value::List(_) => None,
        }
    }

    /// Standard truthiness: zero, empty string, and empty list are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0,
            Value::Text(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    /// Flattens a scalar or (possibly nested) list into scalar text forms,
    /// in order.
    pub fn scalar_texts(&self) -> Vec<String> {
        fn walk(value: &Value, out: &mut Vec<String>) {
            match value {
                Value::Number(n) => out.push(n.to_string()),
                Value::Text(s) => out.push(s.clone()),
                Value::List(items) => {
                    for item in items {
                        walk(item, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// A parsed audit report: key → `Value`.
///
/// Key order is irrelevant (stored sorted); element order inside list values
/// follows first-seen file order. Populated in two phases — raw keys from the
/// text, then derived keys (`*_count`, `primary_ipv4_addresses`,
/// `days_since_audit`) computed last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParsedReport {
    keys: BTreeMap<String, Value>,
}

impl ParsedReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.keys.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_text)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::coerce_i64)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.keys.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.keys.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// An empty report is the soft-failure result of parsing: callers must
    /// treat it as "could not parse", never as a report with no findings.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.keys.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.keys.keys()
    }
}

impl FromIterator<(String, Value)> for ParsedReport {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

// ── Diff results ───────────────────────────────────────────────

/// One changed key with its old and new value.
///
/// Serializes as `{"<key>": {"old": ..., "new": ...}}` — the entry shape of
/// the persisted diff wire format, preserved bit-for-bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedKey {
    pub key: String,
    pub old: Value,
    pub new: Value,
}

#[derive(Serialize)]
struct OldNewRef<'a> {
    old: &'a Value,
    new: &'a Value,
}

#[derive(Deserialize)]
struct OldNew {
    old: Value,
    new: Value,
}

impl Serialize for ChangedKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(
            &self.key,
            &OldNewRef {
                old: &self.old,
                new: &self.new,
            },
        )?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ChangedKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = BTreeMap::<String, OldNew>::deserialize(deserializer)?;
        if entries.len() != 1 {
            return Err(serde::de::Error::custom(
                "changed entry must contain exactly one key",
            ));
        }
        let (key, inner) = entries
            .into_iter()
            .next()
            .ok_or_else(|| serde::de::Error::custom("changed entry must not be empty"))?;
        Ok(ChangedKey {
            key,
            old: inner.old,
            new: inner.new,
        })
    }
}

/// Structural delta between two parsed reports.
///
/// Produced once per upload and persisted verbatim, unfiltered; display-time
/// suppression is the activity filter's job so that silence-rule edits act
/// retroactively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub added: BTreeMap<String, Value>,
    pub removed: BTreeMap<String, Value>,
    pub changed: Vec<ChangedKey>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

// ── Activity events ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Added,
    Changed,
    Removed,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Added => EVENT_ADDED,
            EventKind::Changed => EVENT_CHANGED,
            EventKind::Removed => EVENT_REMOVED,
        }
    }
}

/// Which event kinds a silence rule applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventScope {
    #[default]
    All,
    Added,
    Changed,
    Removed,
}

impl EventScope {
    pub fn matches(self, kind: EventKind) -> bool {
        match self {
            EventScope::All => true,
            EventScope::Added => kind == EventKind::Added,
            EventScope::Changed => kind == EventKind::Changed,
            EventScope::Removed => kind == EventKind::Removed,
        }
    }
}

/// A single stored change event, as shown on the activity timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Device hostname, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub key: String,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

// ── Silence rules ──────────────────────────────────────────────

fn match_all() -> String {
    "*".to_string()
}

fn enabled_by_default() -> bool {
    true
}

/// An organization-scoped rule that suppresses matching change events from
/// display. Evaluated fresh on every read, never cached against a stored
/// diff, so edits instantly change which historical events are visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SilenceRule {
    /// Shell-style glob matched against the full event key.
    #[serde(default = "match_all")]
    pub key_pattern: String,

    #[serde(default)]
    pub event_type: EventScope,

    /// Shell-style glob matched against the device hostname.
    #[serde(default = "match_all")]
    pub host_pattern: String,

    #[serde(default = "enabled_by_default")]
    pub is_active: bool,
}

impl SilenceRule {
    /// A rule silencing every event for keys matching `key_pattern`.
    pub fn for_key(key_pattern: impl Into<String>) -> Self {
        Self {
            key_pattern: key_pattern.into(),
            event_type: EventScope::All,
            host_pattern: match_all(),
            is_active: true,
        }
    }
}

// ── Policy rules & rulesets ────────────────────────────────────

/// A single named compliance rule: one query expression over a parsed report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RuleConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// The query expression, stored verbatim (operator-authored surface).
    pub query: String,

    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    /// Raise an alert when the rule fails. Carried for display; the
    /// evaluator does not act on it.
    #[serde(default)]
    pub alert: bool,
}

/// A named collection of rules. A device is compliant with the ruleset iff
/// every *enabled* rule matches; a ruleset with no enabled rules is
/// vacuously compliant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RulesetConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleConfig>,
}

// ── Compliance outcomes ────────────────────────────────────────

/// Per-rule entry of the compliance explain tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub enabled: bool,
    pub alert: bool,
    /// `None` (serialized as `null`) for disabled rules, which are skipped.
    pub compliant: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetOutcome {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub rules: Vec<RuleOutcome>,
    pub compliant: bool,
}

/// The full explain tree for one device/report evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub compliant: bool,
    pub rulesets: Vec<RulesetOutcome>,
}

// ── Configuration file ─────────────────────────────────────────

/// The on-disk configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConfigFile {
    /// Include other config files. Paths are relative to this config file's
    /// directory. Rulesets are merged: later definitions override earlier
    /// ones by name; silence rules accumulate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub silence: Vec<SilenceRule>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ruleset: Vec<RulesetConfig>,
}

impl ConfigFile {
    pub fn built_in() -> Self {
        Self {
            includes: vec![],
            defaults: Defaults::default(),
            // Known-volatile keys that change on every audit run and would
            // otherwise drown the activity timeline.
            silence: vec![
                SilenceRule::for_key("report_datetime_start"),
                SilenceRule::for_key("report_datetime_end"),
                SilenceRule::for_key("slow_test*"),
                SilenceRule::for_key("uptime_in_seconds"),
                SilenceRule::for_key("days_since_audit"),
            ],
            ruleset: vec![RulesetConfig {
                name: "baseline".to_string(),
                description: "Minimum hardening posture for any fleet host.".to_string(),
                rules: vec![
                    RuleConfig {
                        name: "hardening-floor".to_string(),
                        description: "Hardening index must not fall below 60.".to_string(),
                        query: "hardening_index >= `60`".to_string(),
                        enabled: true,
                        alert: true,
                    },
                    RuleConfig {
                        name: "recent-audit".to_string(),
                        description: "Last audit ran within the past 30 days.".to_string(),
                        query: "days_since_audit <= `30`".to_string(),
                        enabled: true,
                        alert: false,
                    },
                    RuleConfig {
                        name: "firewall-present".to_string(),
                        description: "A host firewall was detected.".to_string(),
                        query: "firewall_installed".to_string(),
                        enabled: true,
                        alert: true,
                    },
                ],
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Defaults {
    /// Cap on raw report size, enforced before parsing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_report_bytes: Option<usize>,

    /// Keys excluded from diffing entirely. Normally empty: suppression
    /// belongs to silence rules so it stays reversible.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_keys: Vec<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            max_report_bytes: Some(DEFAULT_MAX_REPORT_BYTES),
            ignore_keys: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_serializes_untagged() {
        assert_eq!(serde_json::to_value(Value::Number(65)).unwrap(), 65);
        assert_eq!(serde_json::to_value(Value::from("eth0")).unwrap(), "eth0");
        let list = Value::List(vec![Value::from("a"), Value::Number(2)]);
        assert_eq!(
            serde_json::to_value(list).unwrap(),
            serde_json::json!(["a", 2])
        );
    }

    #[test]
    fn value_coerce_i64_accepts_digit_text_only() {
        assert_eq!(Value::from("70").coerce_i64(), Some(70));
        assert_eq!(Value::from("-3").coerce_i64(), Some(-3));
        assert_eq!(Value::Number(5).coerce_i64(), Some(5));
        assert_eq!(Value::from("7a").coerce_i64(), None);
        assert_eq!(Value::from("").coerce_i64(), None);
        assert_eq!(Value::List(vec![]).coerce_i64(), None);
    }

    #[test]
    fn value_truthiness() {
        assert!(Value::Number(1).is_truthy());
        assert!(!Value::Number(0).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::List(vec![Value::Number(0)]).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
    }

    #[test]
    fn scalar_texts_flattens_nested_lists() {
        let v = Value::List(vec![
            Value::from("a"),
            Value::List(vec![Value::from("b"), Value::Number(3)]),
        ]);
        assert_eq!(v.scalar_texts(), vec!["a", "b", "3"]);
    }

    #[test]
    fn changed_key_wire_shape() {
        let entry = ChangedKey {
            key: "hardening_index".to_string(),
            old: Value::Number(65),
            new: Value::Number(70),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"hardening_index": {"old": 65, "new": 70}})
        );

        let back: ChangedKey = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn changed_key_rejects_multi_key_entries() {
        let json = serde_json::json!({
            "a": {"old": 1, "new": 2},
            "b": {"old": 3, "new": 4},
        });
        assert!(serde_json::from_value::<ChangedKey>(json).is_err());
    }

    #[test]
    fn diff_result_field_names_are_the_wire_contract() {
        let mut diff = DiffResult::default();
        diff.added.insert("pam_module".to_string(), Value::from("tally2"));
        diff.changed.push(ChangedKey {
            key: "hardening_index".to_string(),
            old: Value::Number(65),
            new: Value::Number(70),
        });

        let json = serde_json::to_value(&diff).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "added": {"pam_module": "tally2"},
                "removed": {},
                "changed": [{"hardening_index": {"old": 65, "new": 70}}],
            })
        );
    }

    #[test]
    fn event_kind_tokens() {
        assert_eq!(EventKind::Added.as_str(), "added");
        assert_eq!(EventKind::Changed.as_str(), "changed");
        assert_eq!(EventKind::Removed.as_str(), "removed");
    }

    #[test]
    fn event_scope_matching() {
        assert!(EventScope::All.matches(EventKind::Removed));
        assert!(EventScope::Changed.matches(EventKind::Changed));
        assert!(!EventScope::Changed.matches(EventKind::Added));
    }

    #[test]
    fn silence_rule_defaults_are_wildcards() {
        let rule: SilenceRule = toml::from_str("key_pattern = \"ssh_*\"").unwrap();
        assert_eq!(rule.key_pattern, "ssh_*");
        assert_eq!(rule.event_type, EventScope::All);
        assert_eq!(rule.host_pattern, "*");
        assert!(rule.is_active);
    }

    #[test]
    fn built_in_config_silences_volatile_keys_and_has_unique_ruleset_names() {
        let cfg = ConfigFile::built_in();
        assert!(cfg
            .silence
            .iter()
            .any(|r| r.key_pattern == "report_datetime_end"));
        assert!(cfg.silence.iter().all(|r| r.is_active));

        let names: std::collections::HashSet<&str> =
            cfg.ruleset.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names.len(), cfg.ruleset.len());
        assert_eq!(cfg.defaults, Defaults::default());
    }

    #[test]
    fn defaults_cap_report_size() {
        let defaults = Defaults::default();
        assert_eq!(defaults.max_report_bytes, Some(DEFAULT_MAX_REPORT_BYTES));
        assert!(defaults.ignore_keys.is_empty());
    }
}
