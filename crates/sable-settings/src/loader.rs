//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SableSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `SABLE_*` environment variable overrides (highest priority)
//! 4. Validate the result

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::SableSettings;

/// Resolve the settings file path: `$SABLE_SETTINGS`, else `./sable.json`.
pub fn settings_path() -> PathBuf {
    read_env_string("SABLE_SETTINGS").map_or_else(|| PathBuf::from("sable.json"), PathBuf::from)
}

/// Load settings from [`settings_path`] with env var overrides.
pub fn load_settings() -> Result<SableSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<SableSettings> {
    let defaults = serde_json::to_value(SableSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: SableSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge per key; arrays and primitives in `source` replace the
/// target; `null` in `source` keeps the target value.
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

/// Apply `SABLE_*` environment variable overrides.
///
/// Invalid values are logged and ignored.
pub fn apply_env_overrides(settings: &mut SableSettings) {
    let db = &mut settings.database;
    if let Some(v) = read_env_string("SABLE_DB_HOST") {
        db.host = v;
    }
    if let Some(v) = read_env_string("SABLE_DB_DIALECT") {
        db.dialect = v.to_lowercase();
    }
    if let Some(v) = read_env_u16("SABLE_DB_PORT", 1, 65535) {
        db.port = v;
    }
    if let Some(v) = read_env_string("SABLE_DB_USER") {
        db.username = v;
    }
    if let Ok(v) = std::env::var("SABLE_DB_PASSWORD") {
        db.password = v;
    }
    if let Some(v) = read_env_string("SABLE_DB_NAME") {
        db.database = v;
    }
    if let Some(v) = read_env_string("SABLE_DB_CHARSET") {
        db.charset = v;
    }

    if let Some(v) = read_env_bool("SABLE_DEBUG") {
        settings.debug = v;
    }
    if let Some(v) = read_env_bool("SABLE_CACHE_ENABLED") {
        settings.cache.enabled = v;
    }
    if let Some(v) = read_env_u64("SABLE_CACHE_TTL_SECS", 1, 86_400 * 30) {
        settings.cache.ttl_secs = v;
    }
    if let Some(v) = read_env_string("SABLE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Reject settings no connection could be built from.
pub fn validate(settings: &SableSettings) -> Result<()> {
    if settings.database.dialect.trim().is_empty() {
        return Err(SettingsError::InvalidValue(
            "database.dialect must not be empty".to_string(),
        ));
    }
    if settings.retry.max_attempts == 0 {
        return Err(SettingsError::InvalidValue(
            "retry.maxAttempts must be at least 1".to_string(),
        ));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

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

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"database": {"port": 3306, "host": "localhost"}});
        let source = serde_json::json!({"database": {"port": 3307}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["database"]["port"], 3307);
        assert_eq!(merged["database"]["host"], "localhost");
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_array_and_primitive_replace() {
        let merged = deep_merge(
            serde_json::json!({"items": [1, 2], "a": {"b": 1}}),
            serde_json::json!({"items": [3], "a": 5}),
        );
        assert_eq!(merged["items"], serde_json::json!([3]));
        assert_eq!(merged["a"], 5);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_settings_from_path(Path::new("/nonexistent/sable.json")).unwrap();
        assert_eq!(settings.cache.ttl_secs, 300);
        assert_eq!(settings.database.charset, "utf8mb4");
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sable.json");
        std::fs::write(
            &path,
            r#"{"database": {"dialect": "sqlite", "database": ":memory:"}, "retry": {"maxAttempts": 5}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.database.dialect, "sqlite");
        assert_eq!(settings.database.database, ":memory:");
        assert_eq!(settings.database.port, 3306);
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.base_delay_ms, 100);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sable.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result, Err(SettingsError::Json(_))));
    }

    #[test]
    fn load_rejects_zero_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sable.json");
        std::fs::write(&path, r#"{"retry": {"maxAttempts": 0}}"#).unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result, Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn validate_rejects_empty_dialect() {
        let mut s = SableSettings::default();
        s.database.dialect = "  ".to_string();
        assert!(validate(&s).is_err());
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for v in ["true", "TRUE", "1", "yes", "On"] {
            assert_eq!(parse_bool(v), Some(true), "{v}");
        }
        for v in ["false", "0", "no", "OFF"] {
            assert_eq!(parse_bool(v), Some(false), "{v}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("3306", 1, 65535), Some(3306));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("70000", 1, 65535), None);
        assert_eq!(parse_u64_range("60", 1, 100), Some(60));
        assert_eq!(parse_u64_range("-1", 1, 100), None);
    }
}
