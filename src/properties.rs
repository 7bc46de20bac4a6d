//! Minimal reader for Java-style `.properties` files.
//!
//! Supports `key=value` and `key: value` lines, `#` and `!` comments and
//! blank lines. Later keys override earlier ones. Escapes and line
//! continuations are not handled.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

pub type Properties = BTreeMap<String, String>;

pub fn parse_properties(text: &str) -> Properties {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let split = line.find(['=', ':'])?;
            let key = line[..split].trim();
            let value = line[split + 1..].trim();
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

pub fn load_properties(path: &Path) -> Result<Properties> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read properties file: {}", path.display()))?;
    Ok(parse_properties(&text))
}

/// Interprets `true/yes/on/1` and `false/no/off/0`, case-insensitively.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
