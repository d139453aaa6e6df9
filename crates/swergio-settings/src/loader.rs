//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SwergioSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `SWERGIO_*` environment overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::SwergioSettings;

/// Resolve the settings file path.
///
/// `SWERGIO_SETTINGS` wins; otherwise `~/.swergio/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(explicit) = read_env_string("SWERGIO_SETTINGS") {
        return PathBuf::from(explicit);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".swergio").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SwergioSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON or an invalid final value is
/// an error.
pub fn load_settings_from_path(path: &Path) -> Result<SwergioSettings> {
    let mut settings = read_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults with the file at `path` merged over them, without env overrides.
pub fn read_file_layer(path: &Path) -> Result<SwergioSettings> {
    let defaults = serde_json::to_value(SwergioSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values. See the module docs for rules.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning and the file/default value is kept.
pub fn apply_env_overrides(settings: &mut SwergioSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary lookup; `apply_env_overrides` passes
/// the process environment.
pub fn apply_overrides<F>(settings: &mut SwergioSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("SWERGIO_HOST") {
        settings.transport.host = v;
    }
    if let Some(v) = read("SWERGIO_PORT") {
        match parse_range::<u16>(&v, 1, u16::MAX) {
            Some(port) => settings.transport.port = port,
            None => warn!(key = "SWERGIO_PORT", value = %v, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = read("SWERGIO_HEADER_LENGTH") {
        match parse_range::<usize>(&v, 1, crate::types::MAX_HEADER_LENGTH) {
            Some(len) => settings.transport.header_length = len,
            None => warn!(key = "SWERGIO_HEADER_LENGTH", value = %v, "invalid header length env var, ignoring"),
        }
    }
    if let Some(v) = read("SWERGIO_MAX_FRAME_BYTES") {
        match parse_range::<usize>(&v, 1, usize::MAX) {
            Some(max) => settings.transport.max_frame_bytes = max,
            None => warn!(key = "SWERGIO_MAX_FRAME_BYTES", value = %v, "invalid frame size env var, ignoring"),
        }
    }
    if let Some(v) = read("SWERGIO_MAX_CONNECTIONS") {
        match parse_range::<usize>(&v, 1, 100_000) {
            Some(max) => settings.broker.max_connections = max,
            None => warn!(key = "SWERGIO_MAX_CONNECTIONS", value = %v, "invalid connection limit env var, ignoring"),
        }
    }
    if let Some(v) = read("SWERGIO_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("SWERGIO_LOG_JSON") {
        match parse_bool(&v) {
            Some(json) => settings.logging.json = json,
            None => warn!(key = "SWERGIO_LOG_JSON", value = %v, "invalid boolean env var, ignoring"),
        }
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

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

/// Parse a number within an inclusive range.
pub fn parse_range<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    let n: T = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn deep_merge_objects() {
        let a = json!({"transport": {"port": 1, "host": "a"}});
        let b = json!({"transport": {"port": 2}});
        let merged = deep_merge(a, b);
        assert_eq!(merged["transport"]["port"], 2);
        assert_eq!(merged["transport"]["host"], "a");
    }

    #[test]
    fn deep_merge_skips_null() {
        let merged = deep_merge(json!({"x": 1}), json!({"x": null}));
        assert_eq!(merged["x"], 1);
    }

    #[test]
    fn deep_merge_replaces_arrays() {
        let merged = deep_merge(json!({"x": [1, 2, 3]}), json!({"x": [4]}));
        assert_eq!(merged["x"], json!([4]));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = read_file_layer(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, SwergioSettings::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"transport":{"port":9100,"headerLength":12},"broker":{"maxConnections":8}}"#,
        )
        .unwrap();

        let settings = read_file_layer(&path).unwrap();
        assert_eq!(settings.transport.port, 9100);
        assert_eq!(settings.transport.header_length, 12);
        assert_eq!(settings.transport.host, "127.0.0.1");
        assert_eq!(settings.broker.max_connections, 8);
        assert_eq!(settings.broker.outbound_buffer, 1024);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(read_file_layer(&path).is_err());
    }

    #[test]
    fn invalid_final_value_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"transport":{"encoding":"utf-16"}}"#).unwrap();
        // env overrides cannot touch encoding, so validation sees the file value
        assert!(load_settings_from_path(&path).is_err());
    }

    #[test]
    fn overrides_apply() {
        let mut s = SwergioSettings::default();
        apply_overrides(
            &mut s,
            lookup(&[
                ("SWERGIO_HOST", "0.0.0.0"),
                ("SWERGIO_PORT", "9000"),
                ("SWERGIO_HEADER_LENGTH", "16"),
                ("SWERGIO_MAX_CONNECTIONS", "4"),
                ("SWERGIO_LOG_LEVEL", "debug"),
                ("SWERGIO_LOG_JSON", "yes"),
            ]),
        );
        assert_eq!(s.transport.host, "0.0.0.0");
        assert_eq!(s.transport.port, 9000);
        assert_eq!(s.transport.header_length, 16);
        assert_eq!(s.broker.max_connections, 4);
        assert_eq!(s.logging.level, "debug");
        assert!(s.logging.json);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut s = SwergioSettings::default();
        apply_overrides(
            &mut s,
            lookup(&[
                ("SWERGIO_PORT", "0"),
                ("SWERGIO_HEADER_LENGTH", "99"),
                ("SWERGIO_MAX_FRAME_BYTES", "lots"),
                ("SWERGIO_LOG_JSON", "maybe"),
                ("SWERGIO_HOST", ""),
            ]),
        );
        assert_eq!(s, SwergioSettings::default());
    }

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn parse_range_bounds() {
        assert_eq!(parse_range::<u16>("8080", 1, 65535), Some(8080));
        assert_eq!(parse_range::<u16>(" 42 ", 1, 65535), Some(42));
        assert_eq!(parse_range::<u16>("0", 1, 65535), None);
        assert_eq!(parse_range::<usize>("abc", 1, 10), None);
    }
}
