//! Environment variable expansion for configuration files.
//!
//! Supports `${VAR}` (errors when unset) and `${VAR:-default}` (falls back
//! when unset or empty). Run over config text before TOML parsing.

use std::borrow::Cow;

use anyhow::{bail, Result};

pub fn expand_env_vars(text: &str) -> Result<Cow<'_, str>> {
    if !text.contains("${") {
        return Ok(Cow::Borrowed(text));
    }

    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            bail!(
                "unclosed environment variable reference: ${{{}",
                &after[..after.len().min(20)]
            );
        };
        result.push_str(&expand_single_var(&after[..end])?);
        rest = &after[end + 1..];
    }
    result.push_str(rest);

    Ok(Cow::Owned(result))
}

fn expand_single_var(content: &str) -> Result<String> {
    let (name, default) = match content.find(":-") {
        Some(pos) => (&content[..pos], Some(&content[pos + 2..])),
        None => (content, None),
    };
    validate_var_name(name)?;

    match (std::env::var(name), default) {
        (Ok(value), _) if !value.is_empty() => Ok(value),
        (Ok(value), None) => Ok(value),
        (_, Some(fallback)) => Ok(fallback.to_string()),
        (Err(_), None) => bail!(
            "environment variable '{name}' is not set; use ${{{name}:-default}} to provide a fallback"
        ),
    }
}

fn validate_var_name(name: &str) -> Result<()> {
    let valid_start = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("invalid environment variable name '{name}'");
    }
    Ok(())
}
