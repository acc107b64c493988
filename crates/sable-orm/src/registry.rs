//! Connection registry keyed by configuration fingerprint.

use std::sync::Arc;

use dashmap::DashMap;
use sable_core::Result;
use sable_settings::DbConfig;
use tracing::debug;

use crate::cache::{Cache, MemoryCache};
use crate::database::{Database, DatabaseOptions};
use crate::dialect::DialectRegistry;

/// Shares one [`Database`] per distinct connection configuration.
///
/// Lookups are atomic: two threads asking for the same configuration at once
/// get the same handle and only one native connection is opened.
pub struct ConnectionRegistry {
    dialects: DialectRegistry,
    options: DatabaseOptions,
    cache: Option<Arc<dyn Cache>>,
    connections: DashMap<String, Arc<Database>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(DatabaseOptions::default())
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("dialects", &self.dialects)
            .field("options", &self.options)
            .field("connections", &self.connections.len())
            .finish_non_exhaustive()
    }
}

impl ConnectionRegistry {
    /// A registry with the built-in dialects. Each connection gets a private
    /// [`MemoryCache`] unless [`with_cache`](Self::with_cache) is used.
    pub fn new(options: DatabaseOptions) -> Self {
        Self {
            dialects: DialectRegistry::new(),
            options,
            cache: None,
            connections: DashMap::new(),
        }
    }

    /// Share `cache` across every connection.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replace the dialect table.
    #[must_use]
    pub fn with_dialects(mut self, dialects: DialectRegistry) -> Self {
        self.dialects = dialects;
        self
    }

    /// The connection for `config`, opening it on first use.
    pub fn get_or_connect(&self, config: &DbConfig) -> Result<Arc<Database>> {
        let key = config.fingerprint();
        let entry = self.connections.entry(key).or_try_insert_with(|| {
            debug!(dialect = %config.dialect, database = %config.database, "opening registry connection");
            let cache = self
                .cache
                .clone()
                .unwrap_or_else(|| Arc::new(MemoryCache::new()));
            Database::open(config.clone(), self.options.clone(), cache, &self.dialects).map(Arc::new)
        })?;
        Ok(Arc::clone(entry.value()))
    }

    /// Forget the connection for `config`; it closes once the last handle drops.
    pub fn remove(&self, config: &DbConfig) -> Option<Arc<Database>> {
        self.connections.remove(&config.fingerprint()).map(|(_, db)| db)
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is open.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sable_core::OrmError;

    #[test]
    fn same_config_shares_handle() {
        let registry = ConnectionRegistry::default();
        let a = registry.get_or_connect(&DbConfig::sqlite_memory()).unwrap();
        let b = registry.get_or_connect(&DbConfig::sqlite_memory()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_configs_get_distinct_handles() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ConnectionRegistry::default();
        let a = registry.get_or_connect(&DbConfig::sqlite_memory()).unwrap();
        let path = dir.path().join("other.sqlite");
        let b = registry
            .get_or_connect(&DbConfig::sqlite(path.to_string_lossy()))
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
        assert!(registry.remove(&DbConfig::sqlite_memory()).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_dialect_is_connect_error() {
        let registry = ConnectionRegistry::default();
        let config = DbConfig {
            dialect: "oracle".into(),
            ..DbConfig::default()
        };
        assert_matches!(registry.get_or_connect(&config), Err(OrmError::Connect { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn shared_cache_is_used() {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
        let registry = ConnectionRegistry::default().with_cache(Arc::clone(&cache));
        let db = registry.get_or_connect(&DbConfig::sqlite_memory()).unwrap();
        db.cache().set("k", crate::cache::CacheValue::Affected(1), None);
        assert!(cache.get("k").is_some());
    }
}
