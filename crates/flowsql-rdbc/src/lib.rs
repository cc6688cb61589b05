//! # flowsql-rdbc
//!
//! Database connectivity layer for the flowsql SQL operation adapter.
//!
//! Provides the small surface the adapter needs from a database driver:
//! a value/row model for marshaling loosely-typed host records, a
//! [`Connection`](connection::Connection) trait for statement execution
//! (queries, data-modifying statements, and out-bind stored-procedure
//! calls), and credential handling with secret redaction.
//!
//! Anything beyond that — pooling, transactions, TLS, retries — is the
//! driver's or the host's concern and deliberately absent here.
//!
//! ## Feature flags
//!
//! - `mysql` (default) - MySQL/MariaDB backend via mysql_async

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod connection;
pub mod credentials;
pub mod error;
pub mod types;

#[cfg(feature = "mysql")]
pub mod mysql;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::connection::{
        BindDirection, Connection, ConnectionFactory, DatabaseType, ExecResult, OutBinds,
        ProcedureBind,
    };
    pub use crate::credentials::{SensitiveString, SqlCredentials};
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::types::{Row, Value};
}

pub use connection::{
    BindDirection, Connection, ConnectionFactory, DatabaseType, ExecResult, OutBinds,
    ProcedureBind,
};
pub use credentials::{SensitiveString, SqlCredentials};
pub use error::{Error, ErrorCategory, Result};
pub use types::{Row, Value};
