//! Per-table schema creation and versioned upgrades.
//!
//! The applied version of each table lives in the cache under
//! [`version_key`]. [`init_table`] consults it to decide between creating the
//! table, upgrading it, or leaving it alone:
//!
//! ```text
//!  no version / debug ──probe──► missing ──CREATE──► Created
//!                                  │
//!                               exists
//!                                  ▼
//!           version < declared ──tx──► Upgraded | Failed
//!           version ≥ declared ──────► Unchanged
//! ```
//!
//! Upgrade scripts run in one transaction. MySQL commits implicitly on DDL,
//! so a failed MySQL upgrade may leave earlier statements applied; the
//! version record is still left untouched.

use sable_core::{BindParams, OrmError, Result};
use tracing::{error, info};

use crate::cache::{CacheValue, version_key};
use crate::condition::validate_identifier;
use crate::database::Database;
use crate::schema::{Entity, EntitySchema};

/// Where a table ended up after [`init_table`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The table did not exist and was created at the declared version.
    Created,
    /// Upgrade scripts ran and the recorded version moved.
    Upgraded {
        /// Version before the upgrade.
        from: u32,
        /// Version after the upgrade.
        to: u32,
    },
    /// Nothing to do.
    Unchanged,
    /// Creation or upgrade failed and was rolled back.
    Failed {
        /// Diagnostic.
        reason: String,
    },
}

/// Applied schema version of `table`, if recorded.
pub fn recorded_version(db: &Database, table: &str) -> Option<u32> {
    match db.cache().get(&version_key(table)) {
        Some(CacheValue::Version(v)) => Some(v),
        _ => None,
    }
}

fn record_version(db: &Database, table: &str, version: u32) {
    db.cache().set(&version_key(table), CacheValue::Version(version), None);
}

/// Ensure `table` exists and matches the schema version `E` declares.
///
/// Schema-level mistakes (bad identifiers, inconsistent keys) are returned as
/// errors; database failures during create or upgrade become
/// [`MigrationOutcome::Failed`].
pub fn init_table<E: Entity>(db: &Database, table: &str) -> Result<MigrationOutcome> {
    validate_identifier(table)?;
    let schema = EntitySchema::of::<E>()?;
    migrate(db, &schema, table)
}

/// [`init_table`] for an already-derived schema.
pub fn migrate(db: &Database, schema: &EntitySchema, table: &str) -> Result<MigrationOutcome> {
    let declared = schema.schema_version();
    let cached = recorded_version(db, table);

    if (cached.is_none() || db.options().debug) && !db.probe_table(table) {
        return Ok(create(db, schema, table, declared));
    }

    let from = cached.unwrap_or(1);
    if from >= declared {
        if cached.is_none() {
            record_version(db, table, from);
        }
        return Ok(MigrationOutcome::Unchanged);
    }
    Ok(upgrade(db, schema, table, from, declared))
}

fn create(db: &Database, schema: &EntitySchema, table: &str, declared: u32) -> MigrationOutcome {
    let sql = db
        .dialect()
        .render_create_table(schema, table, &db.config().charset);
    match db.execute(&sql, &BindParams::new(), false) {
        Ok(_) => {
            record_version(db, table, declared);
            db.invalidate(table);
            info!(table, version = declared, "table created");
            MigrationOutcome::Created
        }
        Err(e) => {
            error!(table, error = %e, "table creation failed");
            MigrationOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

fn upgrade(db: &Database, schema: &EntitySchema, table: &str, from: u32, to: u32) -> MigrationOutcome {
    info!(table, from, to, "upgrading table");
    let result = db.transaction(|db| {
        let statements = schema
            .upgrade_path(from, to)
            .map_err(|key| OrmError::field(key, "missing upgrade script"))?;
        for sql in &statements {
            let _ = db.execute(sql, &BindParams::new(), false)?;
        }
        Ok(statements.len())
    });

    match result {
        Ok(applied) => {
            record_version(db, table, to);
            db.invalidate(table);
            info!(table, from, to, statements = applied, "table upgraded");
            MigrationOutcome::Upgraded { from, to }
        }
        Err(e) => {
            error!(table, from, to, error = %e, "table upgrade failed, rolled back");
            MigrationOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
