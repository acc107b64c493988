//! Result cache contract and the in-memory store.
//!
//! Read results are stored under `sql/<hash(table)>/<hash(sql + binds)>`, so
//! one prefix delete drops every cached read of a table. Schema version
//! records live in the same store under `table_version_<table>`.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use sable_core::{BindParams, Row};
use sha2::{Digest, Sha256};

/// A cached value.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheValue {
    /// Result rows of a read.
    Rows(Vec<Row>),
    /// Affected-row count.
    Affected(u64),
    /// Applied schema version of a table.
    Version(u32),
}

/// Key-value store with TTL and prefix deletion.
pub trait Cache: Send + Sync {
    /// Look up a live entry.
    fn get(&self, key: &str) -> Option<CacheValue>;

    /// Store an entry; `None` never expires.
    fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>);

    /// Remove one entry.
    fn delete(&self, key: &str);

    /// Remove every entry whose key starts with `prefix`.
    fn delete_prefix(&self, prefix: &str);
}

/// Hex SHA-256 of `input`.
pub fn hash_hex(input: &str) -> String {
    Sha256::digest(input.as_bytes())
        .iter()
        .fold(String::with_capacity(64), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}

/// Prefix shared by every cached read of `table`.
pub fn table_prefix(table: &str) -> String {
    format!("sql/{}/", hash_hex(table))
}

/// Key of one cached read.
pub fn query_key(table: &str, sql: &str, binds: &BindParams) -> String {
    let mut material = String::with_capacity(sql.len() + 32);
    material.push_str(sql);
    material.push('\n');
    material.push_str(&binds.fingerprint());
    format!("{}{}", table_prefix(table), hash_hex(&material))
}

/// Key of the schema version record of `table`.
pub fn version_key(table: &str) -> String {
    format!("table_version_{table}")
}

/// Process-local cache with lazy expiry.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, (CacheValue, Option<Instant>)>,
}

impl MemoryCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheValue> {
        {
            let entry = self.entries.get(key)?;
            if entry.1.is_none_or(|deadline| Instant::now() < deadline) {
                return Some(entry.0.clone());
            }
        }
        let _ = self.entries.remove(key);
        None
    }

    fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) {
        let deadline = ttl.map(|t| Instant::now() + t);
        let _ = self.entries.insert(key.to_string(), (value, deadline));
    }

    fn delete(&self, key: &str) {
        let _ = self.entries.remove(key);
    }

    fn delete_prefix(&self, prefix: &str) {
        self.entries.retain(|k, _| !k.starts_with(prefix));
    }
}
