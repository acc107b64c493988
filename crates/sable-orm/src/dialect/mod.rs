//! SQL dialects.
//!
//! A [`Dialect`] renders the DDL and DML fragments that differ between
//! engines and opens the engine's native connection. Everything else
//! (SELECT/UPDATE/DELETE shape, `:name` placeholders, backtick quoting) is
//! shared, because both supported engines accept it.
//!
//! Dialects are looked up by tag through a [`DialectRegistry`]; hosts may
//! register their own implementation under a new tag.

mod mysql;
mod sqlite;

pub use mysql::MySqlDialect;
pub use sqlite::SqliteDialect;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sable_core::{OrmError, Result, Value};
use sable_settings::DbConfig;

use crate::driver::NativeConnection;
use crate::schema::{ColumnDescriptor, EntitySchema};

/// How an INSERT treats conflicting rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InsertMode {
    /// Plain insert; conflicts fail.
    #[default]
    Normal,
    /// Conflicting rows are skipped.
    Ignore,
    /// Conflicting rows have the named columns overwritten.
    OnDuplicateUpdate,
}

/// Engine-specific rendering and connection contract.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Registry tag (`mysql`, `sqlite`).
    fn tag(&self) -> &'static str;

    /// Full `CREATE TABLE IF NOT EXISTS` statement for `schema`.
    fn render_create_table(&self, schema: &EntitySchema, table: &str, charset: &str) -> String;

    /// One column definition, without a trailing comma.
    fn render_column(&self, column: &ColumnDescriptor, unique: bool) -> String;

    /// Statement emptying `table`.
    fn render_truncate(&self, table: &str) -> String;

    /// Statement prefix for `mode`, up to and including `INTO`.
    fn normalize_insert_mode(&self, mode: InsertMode) -> &'static str;

    /// Conflict tail overwriting `columns` with the incoming values.
    fn render_upsert(&self, columns: &[String]) -> String;

    /// Open a native connection.
    fn connect(&self, config: &DbConfig) -> Result<Box<dyn NativeConnection>>;
}

/// Quote one identifier with backticks, doubling embedded backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a dotted path segment by segment: `u.id` → `` `u`.`id` ``.
pub fn quote_path(path: &str) -> String {
    path.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}

/// Comma-joined quoted identifiers.
pub fn quote_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Render a column default as a `DEFAULT` clause operand.
pub(crate) fn default_literal(value: &Value) -> String {
    match value {
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        other => other.to_sql_literal(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Tag → dialect lookup.
#[derive(Clone)]
pub struct DialectRegistry {
    dialects: HashMap<String, Arc<dyn Dialect>>,
}

impl Default for DialectRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(MySqlDialect));
        registry.register(Arc::new(SqliteDialect));
        registry
    }
}

impl fmt::Debug for DialectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.dialects.keys().collect();
        tags.sort();
        f.debug_struct("DialectRegistry").field("tags", &tags).finish()
    }
}

impl DialectRegistry {
    /// Registry with the built-in `mysql` and `sqlite` dialects.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            dialects: HashMap::new(),
        }
    }

    /// Register `dialect` under its tag, replacing any previous entry.
    pub fn register(&mut self, dialect: Arc<dyn Dialect>) {
        let _ = self.dialects.insert(dialect.tag().to_string(), dialect);
    }

    /// Resolve `tag` (case-insensitive).
    pub fn get(&self, tag: &str) -> Result<Arc<dyn Dialect>> {
        self.dialects
            .get(&tag.to_lowercase())
            .cloned()
            .ok_or_else(|| OrmError::connect(tag, None, format!("no driver registered for dialect `{tag}`")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
