//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ScribeSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `SCRIBE_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::dialect::Dialect;
use crate::errors::Result;
use crate::types::ScribeSettings;

/// Load settings from `path` (if it exists) with env var overrides.
///
/// A missing file yields defaults. A file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ScribeSettings> {
    let mut settings = read_settings_file(path)?;
    apply_env_overrides(&mut settings);
    settings.validate();
    Ok(settings)
}

/// Defaults with the file at `path` merged over them. No env overrides, no
/// validation.
pub fn read_settings_file(path: &Path) -> Result<ScribeSettings> {
    let defaults = serde_json::to_value(ScribeSettings::default())?;

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

/// Defaults plus env var overrides, for runs without a settings file.
pub fn load_default_settings() -> ScribeSettings {
    let mut settings = ScribeSettings::default();
    apply_env_overrides(&mut settings);
    settings.validate();
    settings
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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
        (target, Value::Null) => target,
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_env_overrides(settings: &mut ScribeSettings) {
    if let Some(v) = read_env_string("SCRIBE_DIALECT") {
        match v.parse::<Dialect>() {
            Ok(d) => settings.dialect = d,
            Err(e) => tracing::warn!(key = "SCRIBE_DIALECT", error = %e, "ignoring env var"),
        }
    }
    if let Some(v) = read_env_string("SCRIBE_ENDPOINT") {
        settings.endpoint = Some(v);
    }
    if let Some(v) = read_env_usize("SCRIBE_CONCURRENCY", 1, 1024) {
        settings.batch.concurrency = v;
    }
    if let Some(v) = read_env_usize("SCRIBE_CHUNK_SIZE", 1, 1024 * 1024) {
        settings.stream.chunk_size = v;
    }
    if let Some(v) = read_env_u64("SCRIBE_INTERVAL_MS", 0, 10_000) {
        settings.stream.interval_ms = v;
    }
    if let Some(v) = read_env_string("SCRIBE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn deep_merge_recurses_into_objects() {
        let target = json!({"a": {"x": 1, "y": 2}, "b": 3});
        let source = json!({"a": {"y": 20, "z": 30}});
        let merged = deep_merge(target, source);
        assert_eq!(merged, json!({"a": {"x": 1, "y": 20, "z": 30}, "b": 3}));
    }

    #[test]
    fn deep_merge_replaces_arrays() {
        let merged = deep_merge(json!({"l": [1, 2, 3]}), json!({"l": [9]}));
        assert_eq!(merged, json!({"l": [9]}));
    }

    #[test]
    fn deep_merge_skips_nulls() {
        let merged = deep_merge(json!({"keep": "me"}), json!({"keep": null}));
        assert_eq!(merged["keep"], "me");
        let merged = deep_merge(json!({"keep": "me"}), Value::Null);
        assert_eq!(merged["keep"], "me");
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let s = load_settings_from_path(Path::new("/nonexistent/scribe.json")).unwrap();
        assert_eq!(s.stream.chunk_size, ScribeSettings::default().stream.chunk_size);
    }

    #[test]
    fn load_file_merges_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scribe.json");
        std::fs::write(
            &path,
            r#"{"dialect": "duiRealtime", "query": {"lang": "en-US"}, "stream": {"intervalMs": 0}}"#,
        )
        .unwrap();
        let s = load_settings_from_path(&path).unwrap();
        assert_eq!(s.query.get("lang").map(String::as_str), Some("en-US"));
        assert_eq!(s.stream.interval_ms, 0);
        assert_eq!(s.stream.handshake_timeout_ms, 10_000);
    }

    #[test]
    fn load_invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scribe.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_matches!(load_settings_from_path(&path), Err(SettingsError::Json(_)));
    }

    #[test]
    fn wrongly_typed_field_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scribe.json");
        std::fs::write(&path, r#"{"batch": {"concurrency": "lots"}}"#).unwrap();
        assert_matches!(read_settings_file(&path), Err(SettingsError::Json(e)) if e.is_data());
    }

    #[test]
    fn read_file_skips_env_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scribe.json");
        std::fs::write(&path, r#"{"batch": {"concurrency": 0}}"#).unwrap();
        assert_matches!(read_settings_file(&path), Ok(s) if s.batch.concurrency == 0);
    }

    #[test]
    fn load_validates_after_merge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scribe.json");
        std::fs::write(&path, r#"{"batch": {"concurrency": 0}}"#).unwrap();
        let s = load_settings_from_path(&path).unwrap();
        assert_eq!(s.batch.concurrency, 1);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_usize_range("8", 1, 1024), Some(8));
        assert_eq!(parse_usize_range(" 8 ", 1, 1024), Some(8));
        assert_eq!(parse_usize_range("0", 1, 1024), None);
        assert_eq!(parse_usize_range("2048", 1, 1024), None);
        assert_eq!(parse_usize_range("many", 1, 1024), None);
        assert_eq!(parse_u64_range("0", 0, 10_000), Some(0));
        assert_eq!(parse_u64_range("-1", 0, 10_000), None);
    }
}
