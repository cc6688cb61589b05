//! MySQL backend for flowsql-rdbc
//!
//! Implements [`Connection`] and [`ConnectionFactory`] over `mysql_async`.
//! The backend covers query and execute statements with positional `?`
//! placeholders; out-bind stored-procedure calls are not expressible
//! through this driver and report [`Error::unsupported`].

use async_trait::async_trait;
use chrono::{Datelike, Timelike};
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder};
use tokio::sync::Mutex;
use tracing::debug;

use crate::connection::{
    Connection, ConnectionFactory, DatabaseType, ExecResult, OutBinds, ProcedureBind,
};
use crate::credentials::SqlCredentials;
use crate::error::{Error, Result};
use crate::types::{Row, Value};

/// Convert a flowsql Value to a MySQL parameter
fn value_to_sql(value: &Value) -> mysql_async::Value {
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Bool(b) => mysql_async::Value::from(*b),
        Value::Int64(n) => mysql_async::Value::from(*n),
        Value::Float64(n) => mysql_async::Value::from(*n),
        Value::String(s) => mysql_async::Value::from(s.clone()),
        Value::Bytes(b) => mysql_async::Value::from(b.clone()),
        Value::Date(d) => {
            mysql_async::Value::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0)
        }
        Value::Time(t) => mysql_async::Value::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1000,
        ),
        Value::DateTime(dt) => {
            let date = dt.date();
            let time = dt.time();
            mysql_async::Value::Date(
                date.year() as u16,
                date.month() as u8,
                date.day() as u8,
                time.hour() as u8,
                time.minute() as u8,
                time.second() as u8,
                time.nanosecond() / 1000,
            )
        }
        Value::Json(j) => mysql_async::Value::from(j.to_string()),
    }
}

/// Convert a MySQL value to a flowsql Value
fn mysql_value_to_value(val: mysql_async::Value) -> Value {
    match val {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => Value::String(s),
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        mysql_async::Value::Int(n) => Value::Int64(n),
        mysql_async::Value::UInt(n) => Value::Int64(n as i64),
        mysql_async::Value::Float(f) => Value::Float64(f64::from(f)),
        mysql_async::Value::Double(d) => Value::Float64(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            match chrono::NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
            {
                Some(date) if hour == 0 && min == 0 && sec == 0 && micro == 0 => Value::Date(date),
                Some(date) => chrono::NaiveTime::from_hms_micro_opt(
                    u32::from(hour),
                    u32::from(min),
                    u32::from(sec),
                    micro,
                )
                .map(|time| Value::DateTime(chrono::NaiveDateTime::new(date, time)))
                .unwrap_or(Value::Null),
                None => Value::Null,
            }
        }
        mysql_async::Value::Time(neg, days, hour, min, sec, micro) => {
            let total_hours = days * 24 + u32::from(hour);
            if neg {
                Value::String(format!("-{:02}:{:02}:{:02}", total_hours, min, sec))
            } else {
                chrono::NaiveTime::from_hms_micro_opt(
                    total_hours % 24,
                    u32::from(min),
                    u32::from(sec),
                    micro,
                )
                .map(Value::Time)
                .unwrap_or(Value::Null)
            }
        }
    }
}

/// Convert a driver row into an ordered flowsql row
fn convert_row(row: mysql_async::Row) -> Row {
    let columns: Vec<String> = row
        .columns_ref()
        .iter()
        .map(|c| c.name_str().to_string())
        .collect();

    let values: Vec<Value> = (0..row.len())
        .map(|i| {
            let val: mysql_async::Value = row.as_ref(i).cloned().unwrap_or(mysql_async::Value::NULL);
            mysql_value_to_value(val)
        })
        .collect();

    Row::new(columns, values)
}

/// MySQL connection implementation.
///
/// The driver handle lives behind an async mutex held for the duration
/// of each statement: concurrent statements from one invocation queue
/// on the lock. The slot is empty only after [`close`](Connection::close).
pub struct MySqlConnection {
    conn: Mutex<Option<Conn>>,
}

impl MySqlConnection {
    /// Wrap an already-established driver connection
    pub fn new(conn: Conn) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
        }
    }

    /// Open a connection from host credentials.
    ///
    /// The connection string may be a full `mysql://` URL or a bare
    /// `host[:port][/database]` form; user and password from the
    /// credentials override anything embedded in the URL.
    pub async fn connect(credentials: &SqlCredentials) -> Result<Self> {
        let raw = credentials.connection_string.trim();
        let url = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("mysql://{}", raw)
        };

        let opts = Opts::from_url(&url)
            .map_err(|e| Error::config(format!("Invalid MySQL connection string: {}", e)))?;
        let mut builder = OptsBuilder::from_opts(opts);
        if !credentials.user.is_empty() {
            builder = builder.user(Some(credentials.user.clone()));
        }
        builder = builder.pass(Some(credentials.password.expose_secret().to_string()));

        let conn = Conn::new(builder).await.map_err(|e| {
            Error::connection_with_source(format!("Failed to connect to MySQL: {}", e), e)
        })?;

        debug!("MySQL connection established");
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        // Guard held across execution; overlapping statements queue here
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::connection("Connection is closed"))?;

        let mysql_params: Vec<mysql_async::Value> = params.iter().map(value_to_sql).collect();
        let rows: Vec<mysql_async::Row> = conn
            .exec(sql, mysql_params)
            .await
            .map_err(|e| Error::query_with_sql(format!("Failed to execute query: {}", e), sql))?;

        Ok(rows.into_iter().map(convert_row).collect())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::connection("Connection is closed"))?;

        let mysql_params: Vec<mysql_async::Value> = params.iter().map(value_to_sql).collect();
        conn.exec_drop(sql, mysql_params).await.map_err(|e| {
            Error::query_with_sql(format!("Failed to execute statement: {}", e), sql)
        })?;

        Ok(ExecResult {
            rows_affected: conn.affected_rows(),
            last_insert_id: conn.last_insert_id(),
        })
    }

    async fn call(&self, _statement: &str, _binds: &[ProcedureBind]) -> Result<OutBinds> {
        // mysql_async has no out-bind API; PL/SQL-style call blocks need
        // an Oracle-capable driver.
        Err(Error::unsupported(
            "Out-bind stored-procedure calls are not supported by the MySQL backend",
        ))
    }

    async fn close(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::connection("Connection is closed"))?;
        conn.disconnect()
            .await
            .map_err(|e| Error::connection(format!("Failed to close connection: {}", e)))?;
        debug!("MySQL connection closed");
        Ok(())
    }
}

/// Factory producing [`MySqlConnection`] handles
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnectionFactory;

#[async_trait]
impl ConnectionFactory for MySqlConnectionFactory {
    async fn connect(&self, credentials: &SqlCredentials) -> Result<Box<dyn Connection>> {
        Ok(Box::new(MySqlConnection::connect(credentials).await?))
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySql
    }
}
