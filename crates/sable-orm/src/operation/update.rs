//! UPDATE builder.

use sable_core::{BindParams, OrmError, Result, Value};

use super::{CompiledStatement, quote_table, where_clause};
use crate::condition::{Conditions, fresh_placeholder, validate_identifier};
use crate::database::Database;
use crate::dialect::quote_path;

#[derive(Clone, Debug, PartialEq)]
enum Assign {
    Named(String, Value),
    Raw(String),
}

/// SET clause entries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Assignments {
    entries: Vec<Assign>,
}

impl Assignments {
    /// No assignments.
    pub fn new() -> Self {
        Self::default()
    }

    /// `` `key` = :_UPDATE_key ``.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push(Assign::Named(key.into(), value.into()));
        self
    }

    /// A raw assignment such as `hits = hits + 1`, passed through unescaped.
    #[must_use]
    pub fn raw(mut self, sql: impl Into<String>) -> Self {
        self.entries.push(Assign::Raw(sql.into()));
        self
    }

    /// Whether nothing is assigned.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An immutable UPDATE description.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateQuery {
    /// Target table.
    pub table: String,
    /// SET clause.
    pub assignments: Assignments,
    /// WHERE conditions.
    pub conditions: Option<Conditions>,
}

/// Compile an UPDATE.
pub fn compile_update(query: &UpdateQuery) -> Result<CompiledStatement> {
    let table = quote_table(&query.table)?;
    if query.assignments.is_empty() {
        return Err(OrmError::field("set", "update needs at least one assignment"));
    }

    let mut binds = BindParams::new();
    let mut sets = Vec::with_capacity(query.assignments.entries.len());
    for entry in &query.assignments.entries {
        match entry {
            Assign::Named(key, value) => {
                validate_identifier(key)?;
                let placeholder = fresh_placeholder(&format!(":_UPDATE_{}", key.replace('.', "_")), &binds);
                sets.push(format!("{} = {placeholder}", quote_path(key)));
                binds.insert(placeholder, value.clone());
            }
            Assign::Raw(sql) => sets.push(sql.clone()),
        }
    }

    let (where_sql, where_binds) = where_clause(query.conditions.as_ref())?;
    binds.extend(where_binds);

    Ok(CompiledStatement {
        sql: format!("UPDATE {table} SET {}{where_sql};", sets.join(", ")),
        binds,
        tables: vec![query.table.clone()],
        readonly: false,
    })
}

/// Fluent UPDATE builder.
#[derive(Debug)]
pub struct Update<'a> {
    db: &'a Database,
    query: UpdateQuery,
}

impl<'a> Update<'a> {
    /// Update rows of `table`.
    pub fn new(db: &'a Database, table: impl Into<String>) -> Self {
        Self {
            db,
            query: UpdateQuery {
                table: table.into(),
                ..UpdateQuery::default()
            },
        }
    }

    /// SET clause.
    #[must_use]
    pub fn set(mut self, assignments: Assignments) -> Self {
        self.query.assignments = assignments;
        self
    }

    /// WHERE conditions.
    #[must_use]
    pub fn filter(mut self, conditions: Conditions) -> Self {
        self.query.conditions = Some(conditions);
        self
    }

    /// Compile without executing.
    pub fn compile(&self) -> Result<CompiledStatement> {
        compile_update(&self.query)
    }

    /// Execute; returns the affected-row count.
    pub fn commit(self) -> Result<u64> {
        let stmt = self.compile()?;
        Ok(self.db.run(&stmt)?.affected())
    }
}
