//! Error types for the ORM.
//!
//! [`OrmError`] is returned by every fallible ORM operation. The three core
//! variants mirror the failure classes a caller has to react to differently:
//!
//! - [`OrmError::Connect`]: a driver could not open its native connection
//! - [`OrmError::Execute`]: a statement failed to prepare or run
//! - [`OrmError::Field`]: a caller handed in a malformed field or condition
//!
//! Build errors through the [`OrmError::connect`], [`OrmError::execute`] and
//! [`OrmError::field`] helpers: each one logs the offending SQL or field at
//! error level before returning, so a failure can be diagnosed from the logs
//! even when the caller swallows the error.

use thiserror::Error;

/// Errors that can occur during ORM operations.
#[derive(Debug, Error)]
pub enum OrmError {
    /// The native connection could not be constructed.
    #[error("connect error [{dialect}]: {message}")]
    Connect {
        /// Dialect tag of the driver that failed (`mysql`, `sqlite`, ...).
        dialect: String,
        /// Native error code, when the driver reported one.
        code: Option<i64>,
        /// Native error message.
        message: String,
    },

    /// A statement failed to prepare or execute.
    #[error("execute error: {message}\n  sql: {sql}")]
    Execute {
        /// The compiled SQL text that failed.
        sql: String,
        /// Diagnostic message from the driver or the engine.
        message: String,
    },

    /// A field name or condition shape was rejected before reaching the driver.
    #[error("field error `{field}`: {message}")]
    Field {
        /// The offending field, key, or placeholder.
        field: String,
        /// Why it was rejected.
        message: String,
    },

    /// A structured column value could not be encoded or decoded.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl OrmError {
    /// Build (and log) a [`OrmError::Connect`].
    pub fn connect(dialect: impl Into<String>, code: Option<i64>, message: impl Into<String>) -> Self {
        let dialect = dialect.into();
        let message = message.into();
        tracing::error!(dialect = %dialect, code = ?code, "{message}");
        Self::Connect {
            dialect,
            code,
            message,
        }
    }

    /// Build (and log) a [`OrmError::Execute`].
    pub fn execute(sql: impl Into<String>, message: impl Into<String>) -> Self {
        let sql = sql.into();
        let message = message.into();
        tracing::error!(sql = %sql, "{message}");
        Self::Execute { sql, message }
    }

    /// Build (and log) a [`OrmError::Field`].
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        tracing::error!(field = %field, "{message}");
        Self::Field { field, message }
    }

    /// Whether this is a [`OrmError::Field`].
    pub fn is_field(&self) -> bool {
        matches!(self, Self::Field { .. })
    }

    /// The SQL text attached to an [`OrmError::Execute`], if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Execute { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

/// Convenience type alias for ORM results.
pub type Result<T> = std::result::Result<T, OrmError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
