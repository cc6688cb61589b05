//! Connection traits for flowsql-rdbc
//!
//! Core abstractions for database connectivity:
//! - Connection: statement execution against one live handle
//! - ConnectionFactory: opens connections from host credentials
//! - ProcedureBind: named IN/OUT binds for stored-procedure calls
//!
//! A connection is owned exclusively by one adapter invocation; the
//! adapter guarantees it is closed exactly once on every exit path.

use async_trait::async_trait;
use serde::Serialize;

use crate::credentials::SqlCredentials;
use crate::error::Result;
use crate::types::{Row, Value};

/// Direction of a stored-procedure bind parameter
#[derive(Debug, Clone, PartialEq)]
pub enum BindDirection {
    /// Input parameter with a literal value
    In(Value),
    /// Output parameter; the value is populated by the database
    Out,
}

/// A named bind parameter for a stored-procedure call
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureBind {
    /// Placeholder name (without the leading `:`)
    pub name: String,
    /// In/out direction
    pub direction: BindDirection,
}

impl ProcedureBind {
    /// Create an IN bind carrying a value
    pub fn input(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            direction: BindDirection::In(value),
        }
    }

    /// Create an OUT bind (value populated by the call)
    pub fn output(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: BindDirection::Out,
        }
    }

    /// Whether this is an OUT bind
    #[inline]
    pub fn is_output(&self) -> bool {
        matches!(self.direction, BindDirection::Out)
    }
}

/// Values reported back for OUT binds after a stored-procedure call,
/// in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutBinds(Vec<(String, Value)>);

impl OutBinds {
    /// Create an empty out-bind set
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Record an out-bind value
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.0.push((name.into(), value));
    }

    /// Look up an out-bind value by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

impl From<Vec<(String, Value)>> for OutBinds {
    fn from(values: Vec<(String, Value)>) -> Self {
        Self(values)
    }
}

/// Driver metadata returned for a data-modifying statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecResult {
    /// Number of rows the statement affected
    pub rows_affected: u64,
    /// Auto-generated id of the last inserted row, when the driver reports one
    pub last_insert_id: Option<u64>,
}

/// A live connection to a database, owned by one invocation
#[async_trait]
pub trait Connection: Send + Sync {
    /// Execute a statement that returns rows, as ordered column→value mappings
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a statement that modifies data, returning driver metadata
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult>;

    /// Execute a stored-procedure call statement with named IN/OUT binds,
    /// returning the OUT values reported by the driver
    async fn call(&self, statement: &str, binds: &[ProcedureBind]) -> Result<OutBinds>;

    /// Close the connection. Further use after closing fails.
    async fn close(&self) -> Result<()>;
}

/// Database type identifier, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseType {
    /// MySQL/MariaDB
    MySql,
    /// Oracle
    Oracle,
    /// Unknown/custom
    Unknown,
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MySql => write!(f, "MySQL"),
            Self::Oracle => write!(f, "Oracle"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Factory for opening connections from host credentials
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Open a new connection
    async fn connect(&self, credentials: &SqlCredentials) -> Result<Box<dyn Connection>>;

    /// Get the database type
    fn database_type(&self) -> DatabaseType;
}
