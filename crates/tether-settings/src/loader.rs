//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::TetherSettings;

/// Resolve the path to the settings file (`~/.tether/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tether").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TetherSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or out-of-range values are
/// errors.
pub fn load_settings_from_path(path: &Path) -> Result<TetherSettings> {
    let defaults = serde_json::to_value(TetherSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: TetherSettings = serde_json::from_value(merged)?;
    validate(&settings)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

fn validate(settings: &TetherSettings) -> Result<()> {
    if settings.propagation.max_live_continuations == 0 {
        return Err(SettingsError::InvalidValue(
            "propagation.maxLiveContinuations must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Apply `TETHER_*` overrides read through `lookup`.
///
/// Invalid values are ignored with a warning, keeping the file/default value.
pub fn apply_overrides(settings: &mut TetherSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(raw) = lookup("TETHER_AUTO_START") {
        match parse_bool(&raw) {
            Some(v) => settings.propagation.auto_start = v,
            None => warn!(key = "TETHER_AUTO_START", value = %raw, "invalid boolean env var, ignoring"),
        }
    }
    if let Some(raw) = lookup("TETHER_MAX_LIVE_CONTINUATIONS") {
        match parse_usize_range(&raw, 1, 100_000_000) {
            Some(v) => settings.propagation.max_live_continuations = v,
            None => warn!(
                key = "TETHER_MAX_LIVE_CONTINUATIONS",
                value = %raw,
                "invalid usize env var, ignoring"
            ),
        }
    }
    if let Some(raw) = lookup("TETHER_LOG_LEVEL").filter(|v| !v.is_empty()) {
        settings.logging.level = raw;
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `usize` within an inclusive range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}
