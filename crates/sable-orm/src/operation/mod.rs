//! Operation builders.
//!
//! Each statement kind has a fluent builder borrowing the [`Database`] it
//! runs against, an immutable query value the builder accumulates, and a
//! compile function turning that value into a [`CompiledStatement`]. The
//! statement is compiled once, executed, and discarded.
//!
//! [`Database`]: crate::database::Database

mod delete;
mod insert;
mod select;
mod update;

pub use delete::{Delete, DeleteQuery, compile_delete};
pub use insert::{Insert, InsertQuery, compile_insert};
pub use select::{Order, Paginated, Projection, Select, SelectQuery, compile_select};
pub use update::{Assignments, Update, UpdateQuery, compile_update};

use sable_core::{BindParams, Result};

use crate::condition::{Conditions, validate_identifier};
use crate::dialect::quote_path;

/// SQL text, bindings, and the tables it touches.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledStatement {
    /// `;`-terminated SQL with `:name` placeholders.
    pub sql: String,
    /// Placeholder bindings.
    pub binds: BindParams,
    /// Tables read or written, for cache keying and invalidation.
    pub tables: Vec<String>,
    /// Whether the statement only reads.
    pub readonly: bool,
}

/// Validate and quote a table reference (`name` or `schema.name`).
pub(crate) fn quote_table(table: &str) -> Result<String> {
    validate_identifier(table)?;
    Ok(quote_path(table))
}

/// Compile optional conditions into a ` WHERE ...` clause.
pub(crate) fn where_clause(conditions: Option<&Conditions>) -> Result<(String, BindParams)> {
    match conditions {
        Some(c) if !c.is_empty() => {
            let compiled = c.compile()?;
            Ok((format!(" WHERE {}", compiled.fragment), compiled.binds))
        }
        _ => Ok((String::new(), BindParams::new())),
    }
}
