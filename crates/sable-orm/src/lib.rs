//! # sable-orm
//!
//! A synchronous micro-ORM over MySQL and SQLite.
//!
//! - **Schema**: [`Entity`] lists a record's columns; [`EntitySchema`] validates them
//! - **Dialects**: [`Dialect`] renders DDL and dialect tokens; [`DialectRegistry`] maps tags to drivers
//! - **Conditions**: [`Conditions`] compiles `WHERE` fragments, exploding `IN` lists and rewriting `LIKE`
//! - **Operations**: `Select` / `Insert` / `Update` / `Delete` builders compile to a [`CompiledStatement`]
//! - **Engine**: [`Database`] runs statements with retry, result caching and transactions
//! - **Migrations**: [`init_table`] creates and upgrades tables by declared version
//!
//! ```no_run
//! use sable_orm::{Conditions, Database};
//! use sable_settings::DbConfig;
//!
//! # fn main() -> sable_core::Result<()> {
//! let db = Database::connect(DbConfig::sqlite_memory())?;
//! let rows = db
//!     .select("users")
//!     .filter(Conditions::new().raw("id IN (:ids)").bind("ids", "1,2,3"))
//!     .commit()?;
//! # let _ = rows;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod cache;
pub mod condition;
pub mod database;
pub mod dialect;
pub mod driver;
pub mod migration;
pub mod operation;
pub mod registry;
pub mod schema;

pub use cache::{Cache, CacheValue, MemoryCache};
pub use condition::{CompiledCondition, CondValue, Conditions};
pub use database::{Database, DatabaseOptions, ExecOutcome};
pub use dialect::{Dialect, DialectRegistry, InsertMode};
pub use driver::{NativeConnection, NativeError};
pub use migration::{MigrationOutcome, init_table, migrate};
pub use operation::{
    Assignments, CompiledStatement, Delete, Insert, Order, Paginated, Projection, Select, Update,
};
pub use registry::ConnectionRegistry;
pub use schema::{ColumnDescriptor, ColumnKind, Entity, EntitySchema, UniqueKey, UpgradeScripts};
