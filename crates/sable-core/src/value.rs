//! SQL values, bind parameter maps, and result rows.
//!
//! [`Value`] is the dialect-neutral scalar exchanged with native drivers.
//! [`BindParams`] is the ordered placeholder → value map a compiled statement
//! carries; placeholder names are unique within one map. [`Row`] is one result
//! row with typed accessors used by entity hydration.

use std::fmt;

use serde::de::DeserializeOwned;

use crate::codec;
use crate::errors::{OrmError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Value
// ─────────────────────────────────────────────────────────────────────────────

/// A single SQL value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Boolean, stored as an integer by both supported engines.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// Double precision float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes (non UTF-8 column data).
    Bytes(Vec<u8>),
}

/// The bind type inferred for a [`Value`] at execution time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindType {
    /// Bound as an integer.
    Int,
    /// Bound as a boolean.
    Bool,
    /// Bound as `NULL`.
    Null,
    /// Bound as a string (text, floats, bytes).
    String,
}

impl Value {
    /// Infer how this value is bound to a prepared statement.
    pub fn bind_type(&self) -> BindType {
        match self {
            Self::Int(_) => BindType::Int,
            Self::Bool(_) => BindType::Bool,
            Self::Null => BindType::Null,
            Self::Float(_) | Self::Text(_) | Self::Bytes(_) => BindType::String,
        }
    }

    /// Whether this value is `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Render the value as an SQL literal.
    ///
    /// Only used for diagnostic previews; never for execution.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Bytes(b) => format!("'{}'", String::from_utf8_lossy(b).replace('\'', "''")),
        }
    }

    /// Text form used when a value is bound with [`BindType::String`].
    pub fn as_bind_text(&self) -> Option<String> {
        match self {
            Self::Float(f) => Some(f.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BindParams
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered placeholder → value map.
///
/// Placeholder names keep their leading `:`. Inserting a name that is already
/// present replaces the value in place, so names stay unique.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BindParams {
    entries: Vec<(String, Value)>,
}

impl BindParams {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a binding.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Remove a binding, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(pos).1)
    }

    /// Look up a binding.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Whether the map holds `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Append every binding of `other`, replacing duplicates.
    pub fn extend(&mut self, other: Self) {
        for (name, value) in other.entries {
            self.insert(name, value);
        }
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no bindings.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stable textual form of the bindings, used in cache keys.
    pub fn fingerprint(&self) -> String {
        self.entries
            .iter()
            .map(|(n, v)| format!("{n}={}", v.to_sql_literal()))
            .collect::<Vec<_>>()
            .join("&")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row
// ─────────────────────────────────────────────────────────────────────────────

/// One result row: column names and values in select order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row from parallel column/value vectors.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self { columns, values }
    }

    /// Column names in select order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw value for `column`.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Iterate `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    fn require(&self, column: &str) -> Result<&Value> {
        self.get(column)
            .ok_or_else(|| OrmError::field(column, "column missing from result row"))
    }

    /// Integer accessor. Accepts integers, booleans and numeric text.
    pub fn get_i64(&self, column: &str) -> Result<i64> {
        match self.require(column)? {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| OrmError::field(column, format!("expected integer, got {s:?}"))),
            other => Err(OrmError::field(column, format!("expected integer, got {other:?}"))),
        }
    }

    /// Float accessor. Accepts floats, integers and numeric text.
    #[allow(clippy::cast_precision_loss)]
    pub fn get_f64(&self, column: &str) -> Result<f64> {
        match self.require(column)? {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| OrmError::field(column, format!("expected float, got {s:?}"))),
            other => Err(OrmError::field(column, format!("expected float, got {other:?}"))),
        }
    }

    /// Boolean accessor. Integers are true when non-zero.
    pub fn get_bool(&self, column: &str) -> Result<bool> {
        match self.require(column)? {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Text(s) => Ok(!matches!(s.as_str(), "" | "0" | "false")),
            other => Err(OrmError::field(column, format!("expected boolean, got {other:?}"))),
        }
    }

    /// Text accessor. `NULL` reads as `None`.
    pub fn get_str(&self, column: &str) -> Result<Option<String>> {
        match self.require(column)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            other => Ok(Some(other.to_string())),
        }
    }

    /// Structured accessor for a column written through [`crate::codec`].
    ///
    /// `NULL` reads as `None`.
    pub fn get_serialized<T: DeserializeOwned>(&self, column: &str) -> Result<Option<T>> {
        match self.require(column)? {
            Value::Null => Ok(None),
            Value::Text(s) => codec::decode(s).map(Some),
            Value::Bytes(b) => codec::decode(&String::from_utf8_lossy(b)).map(Some),
            other => Err(OrmError::field(column, format!("expected encoded text, got {other:?}"))),
        }
    }

    /// Consume the row into its `(column, value)` pairs.
    pub fn into_pairs(self) -> Vec<(String, Value)> {
        self.columns.into_iter().zip(self.values).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
