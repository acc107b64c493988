//! Shared fixtures for integration tests.

#![allow(dead_code, missing_docs)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use sable_core::{BindParams, Result, Row, Value, codec};
use sable_orm::dialect::SqliteDialect;
use sable_orm::{
    ColumnDescriptor, Database, DatabaseOptions, Dialect, DialectRegistry, Entity, EntitySchema, InsertMode,
    MemoryCache, NativeConnection, NativeError, UniqueKey,
};
use sable_settings::DbConfig;

// ─────────────────────────────────────────────────────────────────────────────
// Entities
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub age: i64,
    pub tags: Vec<String>,
}

impl User {
    pub fn new(name: &str, email: &str, age: i64) -> Self {
        Self {
            id: 0,
            name: name.into(),
            email: email.into(),
            age,
            tags: Vec::new(),
        }
    }
}

impl Entity for User {
    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::text("name", Some("")).with_length(64),
            ColumnDescriptor::text("email", Some("")),
            ColumnDescriptor::int("age", 0),
            ColumnDescriptor::serialized::<[String]>("tags", &[]).unwrap(),
        ]
    }

    fn unique_keys() -> Vec<UniqueKey> {
        vec![UniqueKey::Single("email".into())]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
            name: row.get_str("name")?.unwrap_or_default(),
            email: row.get_str("email")?.unwrap_or_default(),
            age: row.get_i64("age")?,
            tags: row.get_serialized("tags")?.unwrap_or_default(),
        })
    }

    fn to_record(&self) -> Vec<(String, Value)> {
        vec![
            ("name".into(), self.name.clone().into()),
            ("email".into(), self.email.clone().into()),
            ("age".into(), self.age.into()),
            ("tags".into(), codec::encode(&self.tags).map_or(Value::Null, Value::Text)),
        ]
    }
}

/// In-memory SQLite with a `users` table.
pub fn users_db() -> Database {
    let db = Database::connect(DbConfig::sqlite_memory()).unwrap();
    let schema = EntitySchema::of::<User>().unwrap();
    let ddl = db.dialect().render_create_table(&schema, "users", "utf8mb4");
    let _ = db.execute(&ddl, &BindParams::new(), false).unwrap();
    db
}

pub fn seed(db: &Database, users: &[User]) {
    for user in users {
        let _ = db.insert("users").record(user).commit().unwrap();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted connection
// ─────────────────────────────────────────────────────────────────────────────

/// Shared script and counters for [`FlakyDialect`] connections.
#[derive(Debug, Default)]
pub struct Script {
    failures: Mutex<VecDeque<NativeError>>,
    pub calls: AtomicUsize,
    pub connects: AtomicUsize,
}

impl Script {
    pub fn fail_with(&self, errors: impl IntoIterator<Item = NativeError>) {
        self.failures.lock().extend(errors);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn next(&self) -> std::result::Result<(), NativeError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// A dialect whose connections replay scripted failures, rendering like SQLite.
#[derive(Debug)]
pub struct FlakyDialect {
    pub script: Arc<Script>,
}

struct FlakyConnection {
    script: Arc<Script>,
}

impl NativeConnection for FlakyConnection {
    fn query(&mut self, _sql: &str, _binds: &BindParams) -> std::result::Result<Vec<Row>, NativeError> {
        self.script.next()?;
        Ok(vec![Row::from_pairs([("total", Value::Int(0))])])
    }

    fn execute(&mut self, _sql: &str, _binds: &BindParams) -> std::result::Result<u64, NativeError> {
        self.script.next()?;
        Ok(1)
    }

    fn last_insert_id(&self) -> Option<i64> {
        None
    }
}

impl Dialect for FlakyDialect {
    fn tag(&self) -> &'static str {
        "flaky"
    }

    fn render_create_table(&self, schema: &EntitySchema, table: &str, charset: &str) -> String {
        SqliteDialect.render_create_table(schema, table, charset)
    }

    fn render_column(&self, column: &ColumnDescriptor, unique: bool) -> String {
        SqliteDialect.render_column(column, unique)
    }

    fn render_truncate(&self, table: &str) -> String {
        SqliteDialect.render_truncate(table)
    }

    fn normalize_insert_mode(&self, mode: InsertMode) -> &'static str {
        SqliteDialect.normalize_insert_mode(mode)
    }

    fn render_upsert(&self, columns: &[String]) -> String {
        SqliteDialect.render_upsert(columns)
    }

    fn connect(&self, _config: &DbConfig) -> Result<Box<dyn NativeConnection>> {
        let _ = self.script.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FlakyConnection {
            script: Arc::clone(&self.script),
        }))
    }
}

/// A database over [`FlakyDialect`] and its shared script.
pub fn flaky_db(options: DatabaseOptions) -> (Database, Arc<Script>) {
    let script = Arc::new(Script::default());
    let mut dialects = DialectRegistry::empty();
    dialects.register(Arc::new(FlakyDialect {
        script: Arc::clone(&script),
    }));
    let config = DbConfig {
        dialect: "flaky".into(),
        ..DbConfig::default()
    };
    let db = Database::open(config, options, Arc::new(MemoryCache::new()), &dialects).unwrap();
    (db, script)
}

pub fn gone_away() -> NativeError {
    NativeError::new(Some(2006), "MySQL server has gone away")
}
