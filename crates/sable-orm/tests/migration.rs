//! Table creation and versioned upgrades against in-memory SQLite.

use std::sync::Arc;

use sable_core::{BindParams, Result, Row, Value};
use sable_orm::migration::recorded_version;
use sable_orm::{
    ColumnDescriptor, Database, DatabaseOptions, DialectRegistry, Entity, EntitySchema, MemoryCache,
    MigrationOutcome, UpgradeScripts, init_table, migrate,
};
use sable_settings::DbConfig;

struct Post;

impl Entity for Post {
    fn columns() -> Vec<ColumnDescriptor> {
        vec![ColumnDescriptor::text("title", Some(""))]
    }

    fn from_row(_row: &Row) -> Result<Self> {
        Ok(Self)
    }

    fn to_record(&self) -> Vec<(String, Value)> {
        Vec::new()
    }
}

fn scripts(steps: &[(&str, &str)]) -> UpgradeScripts {
    let mut out = UpgradeScripts::new();
    for (key, sql) in steps {
        out.entry((*key).to_string()).or_default().push((*sql).to_string());
    }
    out
}

fn post_schema(version: u32, upgrades: UpgradeScripts) -> EntitySchema {
    EntitySchema::new(
        Post::primary_key(),
        Post::columns(),
        Vec::new(),
        Vec::new(),
        version,
        upgrades,
    )
    .unwrap()
}

fn columns_of(db: &Database, table: &str) -> Vec<String> {
    db.execute(&format!("PRAGMA table_info({table});"), &BindParams::new(), true)
        .unwrap()
        .into_rows()
        .iter()
        .map(|r| r.get_str("name").unwrap().unwrap_or_default())
        .collect()
}

fn db_at_version_1() -> Database {
    let db = Database::connect(DbConfig::sqlite_memory()).unwrap();
    assert_eq!(init_table::<Post>(&db, "posts").unwrap(), MigrationOutcome::Created);
    db
}

#[test]
fn stepwise_upgrade_applies_pairs_in_order() {
    let db = db_at_version_1();
    let schema = post_schema(
        3,
        scripts(&[
            ("1_2", "ALTER TABLE posts ADD COLUMN body TEXT;"),
            ("2_3", "ALTER TABLE posts ADD COLUMN views INTEGER DEFAULT 0;"),
        ]),
    );

    assert_eq!(
        migrate(&db, &schema, "posts").unwrap(),
        MigrationOutcome::Upgraded { from: 1, to: 3 }
    );
    assert_eq!(recorded_version(&db, "posts"), Some(3));
    assert_eq!(columns_of(&db, "posts"), ["id", "title", "body", "views"]);
    assert_eq!(migrate(&db, &schema, "posts").unwrap(), MigrationOutcome::Unchanged);
}

#[test]
fn missing_pair_rolls_back_and_keeps_version() {
    let db = db_at_version_1();
    let schema = post_schema(3, scripts(&[("1_2", "ALTER TABLE posts ADD COLUMN body TEXT;")]));

    let outcome = migrate(&db, &schema, "posts").unwrap();
    assert!(matches!(outcome, MigrationOutcome::Failed { ref reason } if reason.contains("2_3")));
    assert_eq!(recorded_version(&db, "posts"), Some(1));
    assert_eq!(columns_of(&db, "posts"), ["id", "title"]);
}

#[test]
fn failing_statement_rolls_back_earlier_ones() {
    let db = db_at_version_1();
    let schema = post_schema(
        2,
        scripts(&[
            ("1_2", "ALTER TABLE posts ADD COLUMN body TEXT;"),
            ("1_2", "ALTER TABLE nope ADD COLUMN x TEXT;"),
        ]),
    );
    assert!(matches!(migrate(&db, &schema, "posts").unwrap(), MigrationOutcome::Failed { .. }));
    assert_eq!(columns_of(&db, "posts"), ["id", "title"]);
    assert_eq!(recorded_version(&db, "posts"), Some(1));
}

#[test]
fn direct_script_wins_over_pairs() {
    let db = db_at_version_1();
    let schema = post_schema(
        3,
        scripts(&[
            ("1_3", "ALTER TABLE posts ADD COLUMN summary TEXT;"),
            ("1_2", "ALTER TABLE posts ADD COLUMN body TEXT;"),
            ("2_3", "ALTER TABLE posts ADD COLUMN views INTEGER;"),
        ]),
    );
    assert_eq!(
        migrate(&db, &schema, "posts").unwrap(),
        MigrationOutcome::Upgraded { from: 1, to: 3 }
    );
    assert_eq!(columns_of(&db, "posts"), ["id", "title", "summary"]);
}

#[test]
fn debug_mode_recreates_dropped_table() {
    let db = Database::open(
        DbConfig::sqlite_memory(),
        DatabaseOptions {
            debug: true,
            ..DatabaseOptions::default()
        },
        Arc::new(MemoryCache::new()),
        &DialectRegistry::new(),
    )
    .unwrap();
    assert_eq!(init_table::<Post>(&db, "posts").unwrap(), MigrationOutcome::Created);
    let _ = db.execute("DROP TABLE posts;", &BindParams::new(), false).unwrap();
    assert_eq!(init_table::<Post>(&db, "posts").unwrap(), MigrationOutcome::Created);
}

#[test]
fn drop_table_forgets_version() {
    let db = db_at_version_1();
    db.drop_table("posts").unwrap();
    assert_eq!(recorded_version(&db, "posts"), None);
    assert_eq!(init_table::<Post>(&db, "posts").unwrap(), MigrationOutcome::Created);
}
