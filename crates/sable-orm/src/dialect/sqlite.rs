//! SQLite dialect.

use sable_core::{Result, Value};
use sable_settings::DbConfig;

use super::{Dialect, InsertMode, default_literal, quote_ident, quote_list};
use crate::driver::NativeConnection;
use crate::driver::sqlite::SqliteConnection;
use crate::schema::{ColumnDescriptor, ColumnKind, EntitySchema};

/// SQLite dialect: inline `INTEGER PRIMARY KEY AUTOINCREMENT`, no full-text.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn tag(&self) -> &'static str {
        "sqlite"
    }

    fn render_create_table(&self, schema: &EntitySchema, table: &str, _charset: &str) -> String {
        let pk = schema.primary_key();
        let inline_pk = pk.kind() == ColumnKind::Int && pk.is_auto_increment();

        let mut parts: Vec<String> = schema
            .columns()
            .iter()
            .map(|c| {
                if c.name() == pk.name() {
                    if inline_pk {
                        format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote_ident(c.name()))
                    } else {
                        self.render_column(c, false)
                    }
                } else {
                    self.render_column(c, schema.is_unique(c.name()))
                }
            })
            .collect();

        if !inline_pk {
            parts.push(format!("PRIMARY KEY ({})", quote_ident(pk.name())));
        }
        for group in schema.composite_unique() {
            parts.push(format!("UNIQUE ({})", quote_list(group)));
        }

        format!("CREATE TABLE IF NOT EXISTS {} ({});", quote_ident(table), parts.join(", "))
    }

    fn render_column(&self, column: &ColumnDescriptor, unique: bool) -> String {
        let default = default_literal(column.default_value());
        let ty = match column.kind() {
            ColumnKind::Int if column.is_auto_increment() => "INTEGER".to_string(),
            ColumnKind::Int | ColumnKind::Boolean => format!("INTEGER DEFAULT {default}"),
            ColumnKind::Float => format!("REAL DEFAULT {default}"),
            ColumnKind::Text => match column.default_value() {
                Value::Null => "TEXT DEFAULT NULL".to_string(),
                _ => format!("TEXT DEFAULT {default}"),
            },
            ColumnKind::Serialized => "TEXT DEFAULT NULL".to_string(),
        };
        let unique_tail = if unique { " UNIQUE" } else { "" };
        format!("{} {ty}{unique_tail}", quote_ident(column.name()))
    }

    fn render_truncate(&self, table: &str) -> String {
        format!("DELETE FROM {};", quote_ident(table))
    }

    fn normalize_insert_mode(&self, mode: InsertMode) -> &'static str {
        match mode {
            InsertMode::Normal | InsertMode::OnDuplicateUpdate => "INSERT INTO",
            InsertMode::Ignore => "INSERT OR IGNORE INTO",
        }
    }

    fn render_upsert(&self, columns: &[String]) -> String {
        let sets = columns
            .iter()
            .map(|c| {
                let q = quote_ident(c);
                format!("{q} = excluded.{q}")
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(" ON CONFLICT DO UPDATE SET {sets}")
    }

    fn connect(&self, config: &DbConfig) -> Result<Box<dyn NativeConnection>> {
        Ok(Box::new(SqliteConnection::open(&config.database)?))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
