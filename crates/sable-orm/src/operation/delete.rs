//! DELETE builder.

use sable_core::Result;

use super::{CompiledStatement, quote_table, where_clause};
use crate::condition::Conditions;
use crate::database::Database;

/// An immutable DELETE description.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeleteQuery {
    /// Target table.
    pub table: String,
    /// WHERE conditions; `None` deletes every row.
    pub conditions: Option<Conditions>,
}

/// Compile a DELETE.
pub fn compile_delete(query: &DeleteQuery) -> Result<CompiledStatement> {
    let table = quote_table(&query.table)?;
    let (where_sql, binds) = where_clause(query.conditions.as_ref())?;
    Ok(CompiledStatement {
        sql: format!("DELETE FROM {table}{where_sql};"),
        binds,
        tables: vec![query.table.clone()],
        readonly: false,
    })
}

/// Fluent DELETE builder.
#[derive(Debug)]
pub struct Delete<'a> {
    db: &'a Database,
    query: DeleteQuery,
}

impl<'a> Delete<'a> {
    /// Delete rows of `table`.
    pub fn new(db: &'a Database, table: impl Into<String>) -> Self {
        Self {
            db,
            query: DeleteQuery {
                table: table.into(),
                conditions: None,
            },
        }
    }

    /// WHERE conditions.
    #[must_use]
    pub fn filter(mut self, conditions: Conditions) -> Self {
        self.query.conditions = Some(conditions);
        self
    }

    /// Compile without executing.
    pub fn compile(&self) -> Result<CompiledStatement> {
        compile_delete(&self.query)
    }

    /// Execute; returns the affected-row count.
    pub fn commit(self) -> Result<u64> {
        let stmt = self.compile()?;
        Ok(self.db.run(&stmt)?.affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_core::Value;

    #[test]
    fn with_and_without_where() {
        let all = compile_delete(&DeleteQuery {
            table: "logs".into(),
            conditions: None,
        })
        .unwrap();
        assert_eq!(all.sql, "DELETE FROM `logs`;");

        let some = compile_delete(&DeleteQuery {
            table: "logs".into(),
            conditions: Some(Conditions::new().raw("level IN (:lv)").bind_list("lv", ["debug", "trace"])),
        })
        .unwrap();
        assert_eq!(some.sql, "DELETE FROM `logs` WHERE level IN (:lv_0, :lv_1);");
        assert_eq!(some.binds.get(":lv_0"), Some(&Value::from("debug")));
    }
}
