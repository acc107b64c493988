//! Execution engine.
//!
//! A [`Database`] owns exactly one native connection behind a re-entrant
//! mutex. The owning thread may nest statements inside
//! [`Database::transaction`] while other threads wait their turn.
//!
//! Statements that fail with a transient error (dropped server connection)
//! are retried up to the policy's attempt budget: the connection is rebuilt
//! in place from the stored configuration, then the thread sleeps
//! `base_delay * attempt` with the lock released. Inside a transaction nothing
//! is retried, since a fresh connection would silently lose the transaction.
//!
//! Read-only statements against a single table go through the result cache;
//! any write against a table drops that table's cached reads.

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::ReentrantMutex;
use regex::Regex;
use sable_core::{BindParams, OrmError, Result, RetryPolicy, Row};
use sable_settings::{DbConfig, SableSettings};
use tracing::{debug, info, warn};

use crate::cache::{self, Cache, CacheValue, MemoryCache};
use crate::condition::{is_valid_identifier, validate_identifier};
use crate::dialect::{Dialect, DialectRegistry, quote_path};
use crate::driver::{NativeConnection, NativeError};
use crate::operation::{CompiledStatement, Delete, Insert, Select, Update};

static PLACEHOLDER_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":\w+").unwrap());
static WRITE_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:into|update|from|table(?:\s+if(?:\s+not)?\s+exists)?)\s+([`"]?\w+[`"]?(?:\.[`"]?\w+[`"]?)?)"#)
        .unwrap()
});

/// Engine behaviour knobs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseOptions {
    /// Log a literal-substituted preview of every statement and force schema
    /// re-validation on every table init.
    pub debug: bool,
    /// Transient-failure retry budget.
    pub retry: RetryPolicy,
    /// Lifetime of cached reads; `None` disables read caching.
    pub cache_ttl: Option<Duration>,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            debug: false,
            retry: RetryPolicy::default(),
            cache_ttl: Some(Duration::from_secs(300)),
        }
    }
}

impl DatabaseOptions {
    /// Options described by loaded settings.
    pub fn from_settings(settings: &SableSettings) -> Self {
        Self {
            debug: settings.debug,
            retry: settings.retry,
            cache_ttl: settings
                .cache
                .enabled
                .then(|| Duration::from_secs(settings.cache.ttl_secs)),
        }
    }
}

/// What a statement produced.
#[derive(Clone, Debug, PartialEq)]
pub enum ExecOutcome {
    /// Rows of a read.
    Rows(Vec<Row>),
    /// Affected-row count of a write.
    Affected(u64),
}

impl ExecOutcome {
    /// The rows of a read; empty for a write.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Self::Rows(rows) => rows,
            Self::Affected(_) => Vec::new(),
        }
    }

    /// The affected-row count of a write; row count for a read.
    pub fn affected(&self) -> u64 {
        match self {
            Self::Rows(rows) => rows.len() as u64,
            Self::Affected(n) => *n,
        }
    }
}

impl From<ExecOutcome> for CacheValue {
    fn from(outcome: ExecOutcome) -> Self {
        match outcome {
            ExecOutcome::Rows(rows) => Self::Rows(rows),
            ExecOutcome::Affected(n) => Self::Affected(n),
        }
    }
}

struct Session {
    conn: Box<dyn NativeConnection>,
    in_transaction: bool,
}

/// One database connection with retry, caching and transactions.
pub struct Database {
    config: DbConfig,
    dialect: Arc<dyn Dialect>,
    session: ReentrantMutex<RefCell<Session>>,
    cache: Arc<dyn Cache>,
    generations: DashMap<String, u64>,
    options: DatabaseOptions,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.dialect.tag())
            .field("host", &self.config.host)
            .field("database", &self.config.database)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Connect with the built-in dialects, default options and a private
    /// in-memory cache.
    pub fn connect(config: DbConfig) -> Result<Self> {
        Self::open(
            config,
            DatabaseOptions::default(),
            Arc::new(MemoryCache::new()),
            &DialectRegistry::new(),
        )
    }

    /// Connect using settings for both the connection and the options.
    pub fn from_settings(settings: &SableSettings) -> Result<Self> {
        Self::open(
            settings.database.clone(),
            DatabaseOptions::from_settings(settings),
            Arc::new(MemoryCache::new()),
            &DialectRegistry::new(),
        )
    }

    /// Resolve the dialect for `config` and open its native connection.
    pub fn open(
        config: DbConfig,
        options: DatabaseOptions,
        cache: Arc<dyn Cache>,
        dialects: &DialectRegistry,
    ) -> Result<Self> {
        let dialect = dialects.get(&config.dialect)?;
        let conn = dialect.connect(&config)?;
        info!(dialect = dialect.tag(), host = %config.host, database = %config.database, "database connected");
        Ok(Self {
            config,
            dialect,
            session: ReentrantMutex::new(RefCell::new(Session {
                conn,
                in_transaction: false,
            })),
            cache,
            generations: DashMap::new(),
            options,
        })
    }

    /// Connection parameters.
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// The dialect in use.
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// The result / version cache.
    pub fn cache(&self) -> &dyn Cache {
        self.cache.as_ref()
    }

    /// Engine options.
    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    // ── Builders ────────────────────────────────────────────────────────

    /// Start a SELECT on `table`.
    pub fn select(&self, table: impl Into<String>) -> Select<'_> {
        Select::new(self, table)
    }

    /// Start an INSERT into `table`.
    pub fn insert(&self, table: impl Into<String>) -> Insert<'_> {
        Insert::new(self, table)
    }

    /// Start an UPDATE of `table`.
    pub fn update(&self, table: impl Into<String>) -> Update<'_> {
        Update::new(self, table)
    }

    /// Start a DELETE from `table`.
    pub fn delete(&self, table: impl Into<String>) -> Delete<'_> {
        Delete::new(self, table)
    }

    // ── Execution ───────────────────────────────────────────────────────

    /// Run a compiled statement, using the cache for single-table reads and
    /// invalidating written tables.
    pub fn run(&self, stmt: &CompiledStatement) -> Result<ExecOutcome> {
        if stmt.readonly {
            return self.read_cached(stmt);
        }
        let outcome = self.execute_uncached(&stmt.sql, &stmt.binds, false);
        for table in &stmt.tables {
            self.invalidate(table);
        }
        outcome
    }

    /// Run an INSERT and read the key it generated without letting another
    /// thread's statement in between. `None` when no row was inserted.
    pub fn run_insert(&self, stmt: &CompiledStatement) -> Result<Option<i64>> {
        let _guard = self.session.lock();
        let affected = self.run(stmt)?.affected();
        if affected == 0 {
            return Ok(None);
        }
        Ok(self.last_insert_id())
    }

    /// Run `sql` directly, bypassing the cache.
    ///
    /// A write drops the cached reads of every table named after
    /// `INTO`, `UPDATE`, `FROM` or `TABLE` in `sql`.
    pub fn execute(&self, sql: &str, binds: &BindParams, readonly: bool) -> Result<ExecOutcome> {
        let outcome = self.execute_uncached(sql, binds, readonly);
        if !readonly {
            for table in written_tables(sql) {
                self.invalidate(&table);
            }
        }
        outcome
    }

    fn execute_uncached(&self, sql: &str, binds: &BindParams, readonly: bool) -> Result<ExecOutcome> {
        self.try_execute(sql, binds, readonly)
            .map_err(|e| OrmError::execute(sql, e.to_string()))
    }

    /// Run `sql` with the retry loop, returning the native failure untouched.
    pub(crate) fn try_execute(
        &self,
        sql: &str,
        binds: &BindParams,
        readonly: bool,
    ) -> std::result::Result<ExecOutcome, NativeError> {
        let started = Instant::now();
        let policy = self.options.retry;
        let mut attempt = 1;
        loop {
            let (result, in_transaction) = {
                let guard = self.session.lock();
                let mut session = guard.borrow_mut();
                let in_transaction = session.in_transaction;
                let result = if readonly {
                    session.conn.query(sql, binds).map(ExecOutcome::Rows)
                } else {
                    session.conn.execute(sql, binds).map(ExecOutcome::Affected)
                };
                (result, in_transaction)
            };

            match result {
                Ok(outcome) => {
                    if self.options.debug {
                        info!(
                            sql = %preview_sql(sql, binds),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            attempts = attempt,
                            "statement executed"
                        );
                    }
                    return Ok(outcome);
                }
                Err(e) if e.is_transient() && !in_transaction && policy.should_retry(attempt) => {
                    let delay = policy.backoff(attempt);
                    warn!(
                        attempt,
                        code = ?e.code,
                        error = %e.message,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, reconnecting"
                    );
                    self.reconnect();
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(attempt, in_transaction, "giving up on transient failure");
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Rebuild the native connection from the stored configuration.
    ///
    /// A failed reconnect leaves the old handle in place; the next attempt
    /// surfaces the error.
    pub fn reconnect(&self) {
        match self.dialect.connect(&self.config) {
            Ok(conn) => {
                let guard = self.session.lock();
                guard.borrow_mut().conn = conn;
                debug!(dialect = self.dialect.tag(), "native connection rebuilt");
            }
            Err(e) => warn!(error = %e, "reconnect failed"),
        }
    }

    fn read_cached(&self, stmt: &CompiledStatement) -> Result<ExecOutcome> {
        let (Some(ttl), [table]) = (self.options.cache_ttl, stmt.tables.as_slice()) else {
            return self.execute_uncached(&stmt.sql, &stmt.binds, true);
        };
        if self.in_transaction() {
            return self.execute_uncached(&stmt.sql, &stmt.binds, true);
        }

        let key = cache::query_key(table, &stmt.sql, &stmt.binds);
        if let Some(CacheValue::Rows(rows)) = self.cache.get(&key) {
            debug!(table = %table, "cache hit");
            return Ok(ExecOutcome::Rows(rows));
        }
        let generation = self.generation(table);
        let outcome = self.execute_uncached(&stmt.sql, &stmt.binds, true)?;
        self.store_if_current(table, generation, &key, outcome.clone().into(), ttl);
        Ok(outcome)
    }

    fn generation(&self, table: &str) -> u64 {
        self.generations.get(table).map_or(0, |g| *g)
    }

    /// Cache `value` unless `table` was invalidated after `generation` was
    /// read. Holds the table's generation entry so an invalidation cannot
    /// interleave between the check and the store.
    fn store_if_current(&self, table: &str, generation: u64, key: &str, value: CacheValue, ttl: Duration) {
        let current = self.generations.entry(table.to_string()).or_insert(0);
        if *current == generation {
            self.cache.set(key, value, Some(ttl));
        } else {
            debug!(table, "table written during read, result not cached");
        }
    }

    /// Drop every cached read of `table`.
    pub fn invalidate(&self, table: &str) {
        let mut generation = self.generations.entry(table.to_string()).or_insert(0);
        *generation += 1;
        self.cache.delete_prefix(&cache::table_prefix(table));
    }

    /// Key generated by the most recent insert on this connection.
    pub fn last_insert_id(&self) -> Option<i64> {
        let guard = self.session.lock();
        let session = guard.borrow();
        session.conn.last_insert_id()
    }

    /// Whether a transaction is open on this connection.
    pub fn in_transaction(&self) -> bool {
        let guard = self.session.lock();
        let session = guard.borrow();
        session.in_transaction
    }

    // ── Transactions ────────────────────────────────────────────────────

    /// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// Other threads block until the transaction finishes. A nested call
    /// joins the outer transaction.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let _guard = self.session.lock();
        if self.in_transaction() {
            return f(self);
        }
        self.begin()?;

        let mut scope = TxScope { db: self, done: false };
        let result = f(self);
        scope.done = true;
        match result {
            Ok(value) => match self.commit() {
                Ok(()) => Ok(value),
                Err(e) => {
                    self.rollback();
                    Err(e)
                }
            },
            Err(e) => {
                self.rollback();
                Err(e)
            }
        }
    }

    fn begin(&self) -> Result<()> {
        let guard = self.session.lock();
        let mut session = guard.borrow_mut();
        session
            .conn
            .begin()
            .map_err(|e| OrmError::execute("BEGIN", e.to_string()))?;
        session.in_transaction = true;
        debug!("transaction started");
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let guard = self.session.lock();
        let mut session = guard.borrow_mut();
        session
            .conn
            .commit()
            .map_err(|e| OrmError::execute("COMMIT", e.to_string()))?;
        session.in_transaction = false;
        debug!("transaction committed");
        Ok(())
    }

    fn rollback(&self) {
        let guard = self.session.lock();
        let mut session = guard.borrow_mut();
        session.in_transaction = false;
        match session.conn.rollback() {
            Ok(()) => debug!("transaction rolled back"),
            Err(e) => warn!(error = %e, "rollback failed"),
        }
    }

    // ── Table maintenance ───────────────────────────────────────────────

    /// Whether `table` exists and is readable.
    ///
    /// Failures are expected here, so they are not logged as errors.
    pub fn probe_table(&self, table: &str) -> bool {
        if !is_valid_identifier(table) {
            return false;
        }
        let sql = format!("SELECT count(*) FROM {} LIMIT 1;", quote_path(table));
        match self.try_execute(&sql, &BindParams::new(), true) {
            Ok(_) => true,
            Err(e) => {
                debug!(table, error = %e, "table probe failed");
                false
            }
        }
    }

    /// Empty `table` and drop its cached reads.
    pub fn truncate(&self, table: &str) -> Result<u64> {
        validate_identifier(table)?;
        let sql = self.dialect.render_truncate(table);
        let outcome = self.execute_uncached(&sql, &BindParams::new(), false);
        self.invalidate(table);
        Ok(outcome?.affected())
    }

    /// Drop `table`, its cached reads, and its schema version record.
    pub fn drop_table(&self, table: &str) -> Result<()> {
        validate_identifier(table)?;
        let sql = format!("DROP TABLE IF EXISTS {};", quote_path(table));
        let outcome = self.execute_uncached(&sql, &BindParams::new(), false);
        self.invalidate(table);
        self.cache.delete(&cache::version_key(table));
        outcome.map(|_| ())
    }
}

/// Rolls back if the transaction closure unwinds.
struct TxScope<'a> {
    db: &'a Database,
    done: bool,
}

impl Drop for TxScope<'_> {
    fn drop(&mut self) {
        if !self.done {
            warn!("transaction closure panicked, rolling back");
            self.db.rollback();
        }
    }
}

/// Tables a write statement may touch. Over-reporting only costs a cache miss.
fn written_tables(sql: &str) -> Vec<String> {
    let mut tables: Vec<String> = Vec::new();
    for caps in WRITE_TARGET.captures_iter(sql) {
        let name: String = caps[1].chars().filter(|c| !matches!(c, '`' | '"')).collect();
        let last = name.rsplit_once('.').map(|(_, t)| t.to_string());
        for table in std::iter::once(name).chain(last) {
            if !tables.contains(&table) {
                tables.push(table);
            }
        }
    }
    tables
}

/// Render `sql` with bound values substituted, for logs only.
pub fn preview_sql(sql: &str, binds: &BindParams) -> String {
    PLACEHOLDER_TOKEN
        .replace_all(sql, |caps: &regex::Captures<'_>| {
            binds
                .get(&caps[0])
                .map_or_else(|| caps[0].to_string(), sable_core::Value::to_sql_literal)
        })
        .into_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use sable_core::logging::capture_logs;
    use tracing::Level;

    fn memory_db() -> Database {
        Database::connect(DbConfig::sqlite_memory()).unwrap()
    }

    #[test]
    fn preview_substitutes_literals() {
        let mut binds = BindParams::new();
        binds.insert(":_WHERE_name", "o'neil");
        binds.insert(":ids_1", 5);
        binds.insert(":ids_10", 6);
        let preview = preview_sql("SELECT * FROM t WHERE name = :_WHERE_name AND id IN (:ids_1, :ids_10, :other)", &binds);
        assert_eq!(
            preview,
            "SELECT * FROM t WHERE name = 'o''neil' AND id IN (5, 6, :other)"
        );
    }

    #[test]
    fn written_tables_from_raw_sql() {
        assert_eq!(written_tables("DELETE FROM users WHERE name = 'x';"), ["users"]);
        assert_eq!(written_tables("INSERT OR IGNORE INTO `posts` (`a`) VALUES (:a);"), ["posts"]);
        assert_eq!(written_tables("UPDATE `app`.`users` SET x = 1;"), ["app.users", "users"]);
        assert_eq!(written_tables("ALTER TABLE notes ADD COLUMN body TEXT;"), ["notes"]);
        assert_eq!(written_tables("CREATE TABLE IF NOT EXISTS `t` (x INTEGER);"), ["t"]);
        assert!(written_tables("VACUUM;").is_empty());
    }

    #[test]
    fn read_started_before_invalidation_is_not_stored() {
        let db = memory_db();
        let generation = db.generation("t");
        db.invalidate("t");
        db.store_if_current("t", generation, "sql/k", CacheValue::Affected(1), Duration::from_secs(60));
        assert_eq!(db.cache().get("sql/k"), None);

        let generation = db.generation("t");
        db.store_if_current("t", generation, "sql/k", CacheValue::Affected(1), Duration::from_secs(60));
        assert_eq!(db.cache().get("sql/k"), Some(CacheValue::Affected(1)));
    }

    #[test]
    fn options_from_settings() {
        let mut settings = SableSettings::default();
        settings.cache.enabled = false;
        settings.debug = true;
        let options = DatabaseOptions::from_settings(&settings);
        assert!(options.debug);
        assert_eq!(options.cache_ttl, None);
        assert_eq!(DatabaseOptions::default().cache_ttl, Some(Duration::from_secs(300)));
    }

    #[test]
    fn execute_error_carries_sql() {
        let db = memory_db();
        let err = db.execute("SELECT * FROM nope;", &BindParams::new(), true).unwrap_err();
        assert_eq!(err.sql(), Some("SELECT * FROM nope;"));
    }

    #[test]
    fn transaction_commit_and_rollback() {
        let db = memory_db();
        let none = BindParams::new();
        let _ = db.execute("CREATE TABLE t (x INTEGER);", &none, false).unwrap();

        db.transaction(|db| db.execute("INSERT INTO t VALUES (1);", &BindParams::new(), false).map(|_| ()))
            .unwrap();
        let failed: Result<()> = db.transaction(|db| {
            let _ = db.execute("INSERT INTO t VALUES (2);", &BindParams::new(), false)?;
            Err(OrmError::field("x", "abort"))
        });
        assert!(failed.is_err());
        assert!(!db.in_transaction());

        let rows = db.execute("SELECT x FROM t;", &none, true).unwrap().into_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("x").unwrap(), 1);
    }

    #[test]
    fn nested_transaction_joins_outer() {
        let db = memory_db();
        let _ = db.execute("CREATE TABLE t (x INTEGER);", &BindParams::new(), false).unwrap();
        let result: Result<()> = db.transaction(|db| {
            db.transaction(|db| db.execute("INSERT INTO t VALUES (1);", &BindParams::new(), false).map(|_| ()))?;
            Err(OrmError::field("x", "abort outer"))
        });
        assert!(result.is_err());
        let rows = db.execute("SELECT x FROM t;", &BindParams::new(), true).unwrap().into_rows();
        assert!(rows.is_empty());
    }

    #[test]
    fn debug_mode_logs_preview() {
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
        let (logs, _guard) = capture_logs();
        let mut binds = BindParams::new();
        binds.insert(":v", 42);
        let _ = db.execute("SELECT :v AS v;", &binds, true).unwrap();
        assert!(logs.has_event(Level::INFO, "statement executed"));
        let events = logs.events();
        assert!(events.iter().any(|e| e.field("sql") == Some("SELECT 42 AS v;")));
    }

    #[test]
    fn truncate_and_drop_table() {
        let db = memory_db();
        let none = BindParams::new();
        let _ = db.execute("CREATE TABLE t (x INTEGER);", &none, false).unwrap();
        let _ = db.execute("INSERT INTO t VALUES (1), (2);", &none, false).unwrap();
        assert_eq!(db.truncate("t").unwrap(), 2);
        db.cache().set(&cache::version_key("t"), CacheValue::Version(3), None);
        db.drop_table("t").unwrap();
        assert_eq!(db.cache().get(&cache::version_key("t")), None);
        assert!(db.execute("SELECT * FROM t;", &none, true).is_err());
    }
}
