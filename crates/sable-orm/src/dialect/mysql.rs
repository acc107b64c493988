//! MySQL / MariaDB dialect.

use sable_core::{Result, Value};
use sable_settings::DbConfig;

use super::{Dialect, InsertMode, default_literal, quote_ident, quote_list};
use crate::driver::NativeConnection;
use crate::driver::mysql::MySqlConnection;
use crate::schema::{ColumnDescriptor, ColumnKind, EntitySchema};

/// Longest VARCHAR that fits a utf8mb4 unique index on InnoDB.
const UNIQUE_VARCHAR_LEN: u32 = 191;

/// MySQL-family dialect: `AUTO_INCREMENT`, `FULLTEXT`, InnoDB tables.
#[derive(Clone, Copy, Debug, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// `utf8` is a 3-byte alias on MySQL; store real UTF-8.
    pub fn normalize_charset(charset: &str) -> &str {
        if charset.eq_ignore_ascii_case("utf8") || charset.is_empty() {
            "utf8mb4"
        } else {
            charset
        }
    }
}

impl Dialect for MySqlDialect {
    fn tag(&self) -> &'static str {
        "mysql"
    }

    fn render_create_table(&self, schema: &EntitySchema, table: &str, charset: &str) -> String {
        let pk = schema.primary_key();
        let mut parts: Vec<String> = schema
            .columns()
            .iter()
            .map(|c| {
                let unique = c.name() != pk.name() && schema.is_unique(c.name());
                self.render_column(c, unique)
            })
            .collect();

        parts.push(format!("PRIMARY KEY ({})", quote_ident(pk.name())));
        for group in schema.composite_unique() {
            parts.push(format!("UNIQUE KEY ({})", quote_list(group)));
        }
        if !schema.full_text_keys().is_empty() {
            parts.push(format!(
                "FULLTEXT ( {} ) WITH PARSER ngram",
                schema.full_text_keys().join(",")
            ));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({}) ENGINE=InnoDB DEFAULT CHARSET={};",
            quote_ident(table),
            parts.join(", "),
            Self::normalize_charset(charset)
        )
    }

    fn render_column(&self, column: &ColumnDescriptor, unique: bool) -> String {
        let name = quote_ident(column.name());
        let default = default_literal(column.default_value());
        let unique_tail = if unique { " UNIQUE" } else { "" };

        let ty = match column.kind() {
            ColumnKind::Int if column.is_auto_increment() => return format!("{name} BIGINT AUTO_INCREMENT"),
            ColumnKind::Int => format!("BIGINT DEFAULT {default}{unique_tail}"),
            ColumnKind::Float => format!("DECIMAL(10, 2) DEFAULT {default}{unique_tail}"),
            ColumnKind::Boolean => format!("TINYINT(1) DEFAULT {default}{unique_tail}"),
            ColumnKind::Text if unique => {
                let len = column.length().map_or(UNIQUE_VARCHAR_LEN, |l| l.min(UNIQUE_VARCHAR_LEN));
                format!("VARCHAR({len}) DEFAULT {default} UNIQUE")
            }
            ColumnKind::Text => match (column.length(), column.default_value()) {
                (Some(len), _) => format!("VARCHAR({len}) DEFAULT {default}"),
                (None, Value::Null) => "TEXT DEFAULT NULL".to_string(),
                (None, _) => "LONGTEXT DEFAULT NULL".to_string(),
            },
            ColumnKind::Serialized => "LONGTEXT DEFAULT NULL".to_string(),
        };
        format!("{name} {ty}")
    }

    fn render_truncate(&self, table: &str) -> String {
        format!("TRUNCATE TABLE {};", quote_ident(table))
    }

    fn normalize_insert_mode(&self, mode: InsertMode) -> &'static str {
        match mode {
            InsertMode::Normal | InsertMode::OnDuplicateUpdate => "INSERT INTO",
            InsertMode::Ignore => "INSERT IGNORE INTO",
        }
    }

    fn render_upsert(&self, columns: &[String]) -> String {
        let sets = columns
            .iter()
            .map(|c| {
                let q = quote_ident(c);
                format!("{q} = VALUES({q})")
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(" ON DUPLICATE KEY UPDATE {sets}")
    }

    fn connect(&self, config: &DbConfig) -> Result<Box<dyn NativeConnection>> {
        let charset = Self::normalize_charset(&config.charset);
        Ok(Box::new(MySqlConnection::open(config, charset)?))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{UniqueKey, UpgradeScripts};

    fn schema(
        columns: Vec<ColumnDescriptor>,
        unique: Vec<UniqueKey>,
        full_text: Vec<String>,
    ) -> EntitySchema {
        EntitySchema::new(
            ColumnDescriptor::int("id", 0).auto_increment(),
            columns,
            unique,
            full_text,
            1,
            UpgradeScripts::new(),
        )
        .unwrap()
    }

    #[test]
    fn auto_increment_primary_key() {
        let sql = MySqlDialect.render_create_table(&schema(vec![], vec![], vec![]), "users", "utf8mb4");
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS `users` (`id` BIGINT AUTO_INCREMENT, PRIMARY KEY (`id`)) \
             ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;"
        );
    }

    #[test]
    fn column_types() {
        let d = MySqlDialect;
        assert_eq!(d.render_column(&ColumnDescriptor::int("n", 5), false), "`n` BIGINT DEFAULT 5");
        assert_eq!(d.render_column(&ColumnDescriptor::int("n", 5), true), "`n` BIGINT DEFAULT 5 UNIQUE");
        assert_eq!(
            d.render_column(&ColumnDescriptor::text("email", Some("")), true),
            "`email` VARCHAR(191) DEFAULT '' UNIQUE"
        );
        assert_eq!(
            d.render_column(&ColumnDescriptor::text("code", Some("x")).with_length(32), false),
            "`code` VARCHAR(32) DEFAULT 'x'"
        );
        assert_eq!(
            d.render_column(&ColumnDescriptor::text("bio", Some("")), false),
            "`bio` LONGTEXT DEFAULT NULL"
        );
        assert_eq!(
            d.render_column(&ColumnDescriptor::text("bio", None), false),
            "`bio` TEXT DEFAULT NULL"
        );
        assert_eq!(
            d.render_column(&ColumnDescriptor::float("price", 1.5), false),
            "`price` DECIMAL(10, 2) DEFAULT 1.5"
        );
        assert_eq!(
            d.render_column(&ColumnDescriptor::boolean("active", true), false),
            "`active` TINYINT(1) DEFAULT 1"
        );
        assert_eq!(
            d.render_column(&ColumnDescriptor::serialized("tags", &Vec::<String>::new()).unwrap(), false),
            "`tags` LONGTEXT DEFAULT NULL"
        );
    }

    #[test]
    fn composite_unique_and_fulltext() {
        let s = schema(
            vec![
                ColumnDescriptor::text("title", Some("")),
                ColumnDescriptor::text("body", Some("")),
                ColumnDescriptor::int("org", 0),
            ],
            vec![UniqueKey::Composite(vec!["org".into(), "title".into()])],
            vec!["title".into(), "body".into()],
        );
        let sql = MySqlDialect.render_create_table(&s, "posts", "utf8");
        assert!(sql.contains("UNIQUE KEY (`org`,`title`)"));
        assert!(sql.contains("FULLTEXT ( title,body ) WITH PARSER ngram"));
        assert!(sql.ends_with("ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;"));
    }

    #[test]
    fn dml_tokens() {
        let d = MySqlDialect;
        assert_eq!(d.render_truncate("t"), "TRUNCATE TABLE `t`;");
        assert_eq!(d.normalize_insert_mode(InsertMode::Normal), "INSERT INTO");
        assert_eq!(d.normalize_insert_mode(InsertMode::Ignore), "INSERT IGNORE INTO");
        assert_eq!(
            d.render_upsert(&["name".into(), "age".into()]),
            " ON DUPLICATE KEY UPDATE `name` = VALUES(`name`), `age` = VALUES(`age`)"
        );
    }

    #[test]
    fn charset_normalization() {
        assert_eq!(MySqlDialect::normalize_charset("utf8"), "utf8mb4");
        assert_eq!(MySqlDialect::normalize_charset("UTF8"), "utf8mb4");
        assert_eq!(MySqlDialect::normalize_charset("latin1"), "latin1");
    }
}
