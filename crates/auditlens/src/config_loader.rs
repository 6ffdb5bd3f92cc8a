//! Configuration loading with include resolution.
//!
//! Supports the `includes` directive to compose configs from multiple
//! files, with circular-include detection. Merge semantics: rulesets
//! override earlier definitions by name, silence rules accumulate, and the
//! including file's defaults win.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::debug;

use auditlens_types::{ConfigFile, Defaults};

/// Maximum depth for include resolution to prevent excessive nesting.
const MAX_INCLUDE_DEPTH: usize = 10;

/// Load a configuration file with include resolution.
///
/// `expand_env` runs over each file's text before TOML parsing.
pub fn load_config_with_includes<F>(path: &Path, expand_env: F) -> Result<ConfigFile>
where
    F: Fn(&str) -> Result<String> + Copy,
{
    let mut visited = HashSet::new();
    load_config_recursive(path, expand_env, &mut visited, 0)
}

fn load_config_recursive<F>(
    path: &Path,
    expand_env: F,
    visited: &mut HashSet<PathBuf>,
    depth: usize,
) -> Result<ConfigFile>
where
    F: Fn(&str) -> Result<String> + Copy,
{
    if depth > MAX_INCLUDE_DEPTH {
        bail!(
            "include depth exceeded maximum of {} levels at '{}'",
            MAX_INCLUDE_DEPTH,
            path.display()
        );
    }

    let canonical = path
        .canonicalize()
        .with_context(|| format!("canonicalize path '{}'", path.display()))?;
    if !visited.insert(canonical) {
        bail!("circular include detected: '{}'", path.display());
    }

    debug!("loading config from '{}' (depth {})", path.display(), depth);

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config '{}'", path.display()))?;
    let expanded = expand_env(&text)?;
    let config: ConfigFile =
        toml::from_str(&expanded).with_context(|| format!("parse config '{}'", path.display()))?;

    if config.includes.is_empty() {
        return Ok(config);
    }

    let base_dir = path.parent().unwrap_or(Path::new("."));

    let mut merged = ConfigFile {
        includes: vec![],
        defaults: Defaults::default(),
        silence: vec![],
        ruleset: vec![],
    };

    for include_path in &config.includes {
        let full_path = base_dir.join(include_path);
        debug!(
            "resolving include '{}' relative to '{}'",
            include_path,
            base_dir.display()
        );

        if !full_path.exists() {
            bail!(
                "included config file not found: '{}' (resolved from '{}')",
                full_path.display(),
                include_path
            );
        }

        let included = load_config_recursive(&full_path, expand_env, visited, depth + 1)?;
        merged = merge_configs(merged, included);
    }

    // The including file wins over everything it pulled in.
    let main_without_includes = ConfigFile {
        includes: vec![],
        defaults: config.defaults,
        silence: config.silence,
        ruleset: config.ruleset,
    };
    Ok(merge_configs(merged, main_without_includes))
}

/// Merge two configs. Rulesets from `other` override rulesets from `base`
/// by name; silence rules accumulate; `other`'s defaults win when set.
pub fn merge_configs(base: ConfigFile, other: ConfigFile) -> ConfigFile {
    let defaults = if other.defaults != Defaults::default() {
        other.defaults
    } else {
        base.defaults
    };

    let mut silence = base.silence;
    silence.extend(other.silence);

    let mut rulesets = BTreeMap::new();
    for ruleset in base.ruleset {
        rulesets.insert(ruleset.name.clone(), ruleset);
    }
    for ruleset in other.ruleset {
        rulesets.insert(ruleset.name.clone(), ruleset);
    }

    ConfigFile {
        includes: vec![],
        defaults,
        silence,
        ruleset: rulesets.into_values().collect(),
    }
}
