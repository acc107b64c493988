//! MySQL connections via the blocking `mysql` client.

use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder, Params};
use sable_core::{BindParams, OrmError, Result, Row, Value};
use sable_settings::DbConfig;
use tracing::debug;

use super::{NativeConnection, NativeError};

const CR_SERVER_GONE_ERROR: i64 = 2006;
const CR_SERVER_LOST: i64 = 2013;
const CR_CONN_HOST_ERROR: i64 = 2003;

/// An open MySQL session.
pub struct MySqlConnection {
    conn: Conn,
}

impl std::fmt::Debug for MySqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConnection")
            .field("connection_id", &self.conn.connection_id())
            .finish()
    }
}

impl MySqlConnection {
    /// Connect and run `SET NAMES '<charset>'`.
    pub fn open(config: &DbConfig, charset: &str) -> Result<Self> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(config.host.clone()))
            .tcp_port(config.port)
            .user(Some(config.username.clone()))
            .pass(Some(config.password.clone()))
            .db_name((!config.database.is_empty()).then(|| config.database.clone()))
            .init(vec![format!("SET NAMES '{charset}'")]);

        debug!(host = %config.host, port = config.port, database = %config.database, "connecting to mysql");
        let conn = Conn::new(opts).map_err(|e| {
            let native = NativeError::from(e);
            OrmError::connect("mysql", native.code, native.message)
        })?;
        Ok(Self { conn })
    }
}

impl From<mysql::Error> for NativeError {
    fn from(e: mysql::Error) -> Self {
        match e {
            mysql::Error::MySqlError(m) => Self::new(Some(i64::from(m.code)), m.message),
            mysql::Error::IoError(io) => {
                Self::new(Some(CR_SERVER_LOST), format!("Lost connection to MySQL server: {io}"))
            }
            mysql::Error::CodecError(codec) => Self::new(
                Some(CR_SERVER_GONE_ERROR),
                format!("MySQL server has gone away: {codec}"),
            ),
            mysql::Error::DriverError(mysql::DriverError::PacketOutOfSync) => {
                Self::new(Some(CR_SERVER_GONE_ERROR), "MySQL server has gone away: packets out of order")
            }
            mysql::Error::DriverError(
                driver @ (mysql::DriverError::ConnectTimeout | mysql::DriverError::CouldNotConnect(_)),
            ) => Self::new(Some(CR_CONN_HOST_ERROR), format!("Error connecting to MySQL server: {driver}")),
            other => Self::new(None, other.to_string()),
        }
    }
}

fn to_params(binds: &BindParams) -> Params {
    let named: Vec<(String, mysql::Value)> = binds
        .iter()
        .map(|(name, value)| {
            let v = match value {
                Value::Null => mysql::Value::NULL,
                Value::Int(i) => mysql::Value::Int(*i),
                Value::Bool(b) => mysql::Value::Int(i64::from(*b)),
                other => mysql::Value::Bytes(other.as_bind_text().unwrap_or_default().into_bytes()),
            };
            (name.trim_start_matches(':').to_string(), v)
        })
        .collect();
    Params::from(named)
}

fn from_mysql(value: &mysql::Value) -> Value {
    match value {
        mysql::Value::NULL => Value::Null,
        mysql::Value::Int(i) => Value::Int(*i),
        mysql::Value::UInt(u) => Value::Int(i64::try_from(*u).unwrap_or(i64::MAX)),
        mysql::Value::Float(f) => Value::Float(f64::from(*f)),
        mysql::Value::Double(f) => Value::Float(*f),
        mysql::Value::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) => Value::Text(s.to_string()),
            Err(_) => Value::Bytes(b.clone()),
        },
        mysql::Value::Date(y, mo, d, h, mi, s, _) => {
            Value::Text(format!("{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}"))
        }
        mysql::Value::Time(neg, days, h, mi, s, _) => {
            let sign = if *neg { "-" } else { "" };
            let hours = u64::from(*days) * 24 + u64::from(*h);
            Value::Text(format!("{sign}{hours:02}:{mi:02}:{s:02}"))
        }
    }
}

fn from_mysql_row(row: &mysql::Row) -> Row {
    let columns: Vec<String> = row
        .columns_ref()
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect();
    let values = (0..row.len())
        .map(|i| row.as_ref(i).map_or(Value::Null, from_mysql))
        .collect();
    Row::new(columns, values)
}

impl NativeConnection for MySqlConnection {
    fn query(&mut self, sql: &str, binds: &BindParams) -> std::result::Result<Vec<Row>, NativeError> {
        let rows: Vec<mysql::Row> = if binds.is_empty() {
            self.conn.query(sql)?
        } else {
            self.conn.exec(sql, to_params(binds))?
        };
        Ok(rows.iter().map(from_mysql_row).collect())
    }

    fn execute(&mut self, sql: &str, binds: &BindParams) -> std::result::Result<u64, NativeError> {
        if binds.is_empty() {
            self.conn.query_drop(sql)?;
        } else {
            self.conn.exec_drop(sql, to_params(binds))?;
        }
        Ok(self.conn.affected_rows())
    }

    fn last_insert_id(&self) -> Option<i64> {
        i64::try_from(self.conn.last_insert_id())
            .ok()
            .filter(|id| *id > 0)
    }

    fn begin(&mut self) -> std::result::Result<(), NativeError> {
        Ok(self.conn.query_drop("START TRANSACTION")?)
    }

    fn commit(&mut self) -> std::result::Result<(), NativeError> {
        Ok(self.conn.query_drop("COMMIT")?)
    }

    fn rollback(&mut self) -> std::result::Result<(), NativeError> {
        Ok(self.conn.query_drop("ROLLBACK")?)
    }
}
