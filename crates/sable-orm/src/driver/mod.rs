//! Native connection handles.
//!
//! A [`NativeConnection`] is the thin seam between the execution engine and an
//! engine's client library. Statements arrive fully compiled with `:name`
//! placeholders and a [`BindParams`] map; bindings whose name does not occur
//! in the statement are ignored.

pub mod mysql;
pub mod sqlite;

use std::fmt;

use sable_core::retry;
use sable_core::{BindParams, Row};

/// A failure reported by a native client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeError {
    /// Engine error code, when reported.
    pub code: Option<i64>,
    /// Engine error message.
    pub message: String,
}

impl NativeError {
    /// Build an error.
    pub fn new(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Whether this failure looks like a dropped connection.
    pub fn is_transient(&self) -> bool {
        retry::is_transient(self.code, &self.message)
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for NativeError {}

/// An open session with a database engine.
pub trait NativeConnection: Send {
    /// Run a statement returning rows.
    fn query(&mut self, sql: &str, binds: &BindParams) -> Result<Vec<Row>, NativeError>;

    /// Run a statement returning the affected-row count.
    fn execute(&mut self, sql: &str, binds: &BindParams) -> Result<u64, NativeError>;

    /// Key generated by the most recent insert.
    fn last_insert_id(&self) -> Option<i64>;

    /// Open a transaction.
    fn begin(&mut self) -> Result<(), NativeError> {
        self.execute("BEGIN", &BindParams::new()).map(|_| ())
    }

    /// Commit the open transaction.
    fn commit(&mut self) -> Result<(), NativeError> {
        self.execute("COMMIT", &BindParams::new()).map(|_| ())
    }

    /// Roll back the open transaction.
    fn rollback(&mut self) -> Result<(), NativeError> {
        self.execute("ROLLBACK", &BindParams::new()).map(|_| ())
    }
}
