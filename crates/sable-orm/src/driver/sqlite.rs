//! SQLite connections via `rusqlite`.

use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, Statement};
use sable_core::{BindParams, OrmError, Result, Row, Value};
use tracing::debug;

use super::{NativeConnection, NativeError};

/// File used when no database path is configured.
pub const DEFAULT_DATABASE_FILE: &str = "database.sqlite";

/// An open `SQLite` database.
pub struct SqliteConnection {
    conn: Connection,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.conn.path())
            .finish()
    }
}

/// Resolve the configured database string to a location.
///
/// `None` means in-memory.
pub fn resolve_path(database: &str) -> Option<PathBuf> {
    match database.trim() {
        ":memory:" => None,
        "" => Some(PathBuf::from(DEFAULT_DATABASE_FILE)),
        path => Some(PathBuf::from(path)),
    }
}

impl SqliteConnection {
    /// Open (creating if needed) the database named by `database`.
    pub fn open(database: &str) -> Result<Self> {
        let conn = match resolve_path(database) {
            None => Connection::open_in_memory(),
            Some(path) => {
                create_parent_dir(&path)?;
                debug!(path = %path.display(), "opening sqlite database");
                Connection::open(&path)
            }
        }
        .map_err(|e| connect_error(&e))?;

        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| connect_error(&e))?;
        Ok(Self { conn })
    }

    fn prepare_bound(&self, sql: &str, binds: &BindParams) -> rusqlite::Result<Statement<'_>> {
        let mut stmt = self.conn.prepare(sql)?;
        bind_all(&mut stmt, binds)?;
        Ok(stmt)
    }
}

fn create_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
            .map_err(|e| OrmError::connect("sqlite", None, format!("cannot create {}: {e}", dir.display()))),
        _ => Ok(()),
    }
}

fn connect_error(e: &rusqlite::Error) -> OrmError {
    let native = NativeError::from_ref(e);
    OrmError::connect("sqlite", native.code, native.message)
}

fn bind_all(stmt: &mut Statement<'_>, binds: &BindParams) -> rusqlite::Result<()> {
    for (name, value) in binds.iter() {
        let Some(idx) = stmt.parameter_index(name)? else {
            continue;
        };
        match value {
            Value::Int(i) => stmt.raw_bind_parameter(idx, i)?,
            Value::Bool(b) => stmt.raw_bind_parameter(idx, i64::from(*b))?,
            Value::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null)?,
            other => stmt.raw_bind_parameter(idx, other.as_bind_text().unwrap_or_default())?,
        }
    }
    Ok(())
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

impl NativeError {
    fn from_ref(e: &rusqlite::Error) -> Self {
        let code = match e {
            rusqlite::Error::SqliteFailure(f, _) => Some(i64::from(f.extended_code)),
            _ => None,
        };
        Self::new(code, e.to_string())
    }
}

impl From<rusqlite::Error> for NativeError {
    fn from(e: rusqlite::Error) -> Self {
        Self::from_ref(&e)
    }
}

impl NativeConnection for SqliteConnection {
    fn query(&mut self, sql: &str, binds: &BindParams) -> std::result::Result<Vec<Row>, NativeError> {
        let mut stmt = self.prepare_bound(sql, binds)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|i| row.get_ref(i).map(from_value_ref))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            out.push(Row::new(columns.clone(), values));
        }
        Ok(out)
    }

    fn execute(&mut self, sql: &str, binds: &BindParams) -> std::result::Result<u64, NativeError> {
        let mut stmt = self.prepare_bound(sql, binds)?;
        let affected = stmt.raw_execute()?;
        Ok(affected as u64)
    }

    fn last_insert_id(&self) -> Option<i64> {
        let id = self.conn.last_insert_rowid();
        (id > 0).then_some(id)
    }
}
