//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may specify any subset of fields.

mod database;

pub use database::*;

use sable_core::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Root settings for an ORM host.
///
/// ```json
/// {
///   "database": { "dialect": "sqlite", "database": "data/app.sqlite" },
///   "cache": { "ttlSecs": 60 },
///   "debug": true
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SableSettings {
    /// Connection parameters.
    pub database: DbConfig,
    /// SQL preview logging and forced schema re-validation.
    pub debug: bool,
    /// Read-result cache.
    pub cache: CacheSettings,
    /// Transient-failure retry budget.
    pub retry: RetryPolicy,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Read-result cache settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Whether read-only statements go through the cache.
    pub enabled: bool,
    /// Entry lifetime in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = SableSettings::default();
        assert!(!s.debug);
        assert!(s.cache.enabled);
        assert_eq!(s.cache.ttl_secs, 300);
        assert_eq!(s.retry.max_attempts, 3);
        assert_eq!(s.retry.base_delay_ms, 100);
        assert_eq!(s.logging.level, "warn");
        assert_eq!(s.database.dialect, "mysql");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: SableSettings =
            serde_json::from_str(r#"{"cache": {"ttlSecs": 10}, "debug": true}"#).unwrap();
        assert!(s.debug);
        assert!(s.cache.enabled);
        assert_eq!(s.cache.ttl_secs, 10);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(SableSettings::default()).unwrap();
        assert!(json["cache"].get("ttlSecs").is_some());
        assert!(json["retry"].get("maxAttempts").is_some());
    }
}
