//! INSERT builder.

use sable_core::{BindParams, OrmError, Result, Value};

use super::{CompiledStatement, quote_table};
use crate::condition::validate_identifier;
use crate::database::Database;
use crate::dialect::{Dialect, InsertMode, quote_path};
use crate::schema::Entity;

/// An immutable INSERT description.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InsertQuery {
    /// Target table.
    pub table: String,
    /// Conflict handling.
    pub mode: InsertMode,
    /// Column names.
    pub keys: Vec<String>,
    /// Value groups, one per row, each as long as `keys`.
    pub rows: Vec<Vec<Value>>,
    /// Columns overwritten on conflict (`OnDuplicateUpdate` only).
    pub update_columns: Vec<String>,
}

/// Compile an INSERT for `dialect`.
///
/// Every value gets a fresh `:_INSERT_n` placeholder, numbered across rows.
pub fn compile_insert(dialect: &dyn Dialect, query: &InsertQuery) -> Result<CompiledStatement> {
    if query.mode == InsertMode::OnDuplicateUpdate && query.update_columns.is_empty() {
        return Err(OrmError::field(
            "update_columns",
            "on-duplicate-update insert needs at least one update column",
        ));
    }
    let table = quote_table(&query.table)?;
    if query.keys.is_empty() {
        return Err(OrmError::field("keys", "insert needs at least one column"));
    }
    if query.rows.is_empty() {
        return Err(OrmError::field("values", "insert needs at least one value group"));
    }
    for key in query.keys.iter().chain(&query.update_columns) {
        validate_identifier(key)?;
    }

    let mut binds = BindParams::new();
    let mut groups = Vec::with_capacity(query.rows.len());
    let mut n = 0usize;
    for row in &query.rows {
        if row.len() != query.keys.len() {
            return Err(OrmError::field(
                "values",
                format!("value group has {} values for {} keys", row.len(), query.keys.len()),
            ));
        }
        let mut placeholders = Vec::with_capacity(row.len());
        for value in row {
            let name = format!(":_INSERT_{n}");
            n += 1;
            binds.insert(name.clone(), value.clone());
            placeholders.push(name);
        }
        groups.push(format!("({})", placeholders.join(", ")));
    }

    let columns = query
        .keys
        .iter()
        .map(|k| quote_path(k))
        .collect::<Vec<_>>()
        .join(",");
    let upsert = if query.mode == InsertMode::OnDuplicateUpdate {
        dialect.render_upsert(&query.update_columns)
    } else {
        String::new()
    };

    Ok(CompiledStatement {
        sql: format!(
            "{} {table} ({columns}) VALUES {}{upsert};",
            dialect.normalize_insert_mode(query.mode),
            groups.join(", ")
        ),
        binds,
        tables: vec![query.table.clone()],
        readonly: false,
    })
}

/// Fluent INSERT builder.
#[derive(Debug)]
pub struct Insert<'a> {
    db: &'a Database,
    query: InsertQuery,
}

impl<'a> Insert<'a> {
    /// Insert into `table`.
    pub fn new(db: &'a Database, table: impl Into<String>) -> Self {
        Self {
            db,
            query: InsertQuery {
                table: table.into(),
                ..InsertQuery::default()
            },
        }
    }

    /// Conflict handling.
    #[must_use]
    pub fn mode(mut self, mode: InsertMode) -> Self {
        self.query.mode = mode;
        self
    }

    /// Overwrite `columns` on conflict.
    #[must_use]
    pub fn on_duplicate_update<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.mode = InsertMode::OnDuplicateUpdate;
        self.query.update_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Column names for the value groups that follow.
    #[must_use]
    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Append one value group.
    #[must_use]
    pub fn values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.query.rows.push(values.into_iter().map(Into::into).collect());
        self
    }

    /// Add one column to a single-row insert.
    #[must_use]
    pub fn key_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.keys.push(key.into());
        match self.query.rows.first_mut() {
            Some(row) => row.push(value.into()),
            None => self.query.rows.push(vec![value.into()]),
        }
        self
    }

    /// Replace keys and values with one row of `(column, value)` pairs.
    #[must_use]
    pub fn key_values<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (keys, row): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        self.query.keys = keys;
        self.query.rows = vec![row];
        self
    }

    /// Insert the persisted columns of `record`.
    #[must_use]
    pub fn record<E: Entity>(self, record: &E) -> Self {
        self.key_values(record.to_record())
    }

    /// The accumulated query.
    pub fn query(&self) -> &InsertQuery {
        &self.query
    }

    /// Compile without executing.
    pub fn compile(&self) -> Result<CompiledStatement> {
        compile_insert(self.db.dialect(), &self.query)
    }

    /// Execute; returns the generated key when a row was inserted.
    pub fn commit(self) -> Result<Option<i64>> {
        let stmt = self.compile()?;
        self.db.run_insert(&stmt)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
