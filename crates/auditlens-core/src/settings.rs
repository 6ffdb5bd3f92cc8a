use std::collections::BTreeSet;

use auditlens_types::{Defaults, DEFAULT_MAX_REPORT_BYTES};

/// Resolved runtime settings.
///
/// Built once from configuration at process start and passed explicitly to
/// the operations that need it — there is no ambient settings singleton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Raw report size cap, enforced before parsing.
    pub max_report_bytes: usize,
    /// Keys excluded from diffing entirely. Normally empty; reversible
    /// suppression belongs to silence rules.
    pub ignore_keys: BTreeSet<String>,
}

impl Settings {
    pub fn resolve(defaults: &Defaults) -> Self {
        Self {
            max_report_bytes: defaults.max_report_bytes.unwrap_or(DEFAULT_MAX_REPORT_BYTES),
            ignore_keys: defaults.ignore_keys.iter().cloned().collect(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::resolve(&Defaults::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_fills_the_size_cap_from_defaults() {
        let settings = Settings::resolve(&Defaults {
            max_report_bytes: Some(1024),
            ignore_keys: vec!["uptime_in_seconds".to_string()],
        });
        assert_eq!(settings.max_report_bytes, 1024);
        assert!(settings.ignore_keys.contains("uptime_in_seconds"));
    }

    #[test]
    fn default_settings_match_default_config() {
        let settings = Settings::default();
        assert_eq!(settings.max_report_bytes, DEFAULT_MAX_REPORT_BYTES);
        assert!(settings.ignore_keys.is_empty());
    }
}
