//! Connection parameters.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Parameters for one database connection.
///
/// For `sqlite`, `database` is the file path (`:memory:` for an in-memory
/// database, empty for `database.sqlite` in the working directory) and the
/// network fields are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DbConfig {
    /// Server host.
    pub host: String,
    /// Dialect tag (`mysql`, `sqlite`).
    pub dialect: String,
    /// Server port.
    pub port: u16,
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Schema name, or file path for `sqlite`.
    pub database: String,
    /// Connection character set.
    pub charset: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            dialect: "mysql".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: String::new(),
            database: String::new(),
            charset: "utf8mb4".to_string(),
        }
    }
}

impl DbConfig {
    /// An in-memory `SQLite` configuration.
    pub fn sqlite_memory() -> Self {
        Self::sqlite(":memory:")
    }

    /// A file-backed `SQLite` configuration.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            dialect: "sqlite".to_string(),
            database: path.into(),
            ..Self::default()
        }
    }

    /// Stable SHA-256 hex digest over every field.
    ///
    /// Two configurations share a fingerprint only when all fields match.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.host.as_str(),
            self.dialect.as_str(),
            &self.port.to_string(),
            self.username.as_str(),
            self.password.as_str(),
            self.database.as_str(),
            self.charset.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        hasher
            .finalize()
            .iter()
            .fold(String::with_capacity(64), |mut out, b| {
                let _ = write!(out, "{b:02x}");
                out
            })
    }
}
