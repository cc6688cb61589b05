//! # flowsql-connect
//!
//! A SQL operation adapter for workflow-automation hosts. The host
//! hands the adapter an operation name, a loosely-typed parameter bag,
//! and a batch of input items; the adapter runs the operation against a
//! relational database through the [`flowsql_rdbc`] driver layer and
//! returns a batch of output items.
//!
//! Four operations are supported:
//!
//! - **execute-query**: one SQL query per input item, fanned out
//!   concurrently over one connection
//! - **execute-stored-procedure**: one call with IN and OUT binds,
//!   returning the OUT values as a single item
//! - **insert**: one multi-row INSERT for the whole batch
//! - **update**: one keyed UPDATE per input item, fanned out
//!   concurrently
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use flowsql_connect::prelude::*;
//! use flowsql_rdbc::mysql::MySqlConnectionFactory;
//! use flowsql_rdbc::SqlCredentials;
//!
//! # async fn run() -> flowsql_rdbc::Result<()> {
//! let adapter = SqlOperationAdapter::new(Arc::new(MySqlConnectionFactory));
//! let credentials = SqlCredentials::new("app", "secret", "db.example.com:3306/app");
//!
//! let invocation = Invocation::new(
//!     "executeQuery",
//!     serde_json::json!({ "query": "SELECT id, name FROM product" }),
//! )
//! .with_items(vec![Item::new(Default::default())]);
//!
//! let items = adapter.run(&credentials, &invocation).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapter;
pub mod items;
pub mod operation;
pub mod statement;

pub use adapter::{
    CredentialTestResult, CredentialTestStatus, Invocation, SqlOperationAdapter, TableCandidate,
};
pub use items::{Item, JsonMap};
pub use operation::Operation;

/// Convenience re-exports for adapter users
pub mod prelude {
    pub use crate::adapter::{
        CredentialTestResult, CredentialTestStatus, Invocation, SqlOperationAdapter,
        TableCandidate,
    };
    pub use crate::items::{Item, JsonMap};
    pub use crate::operation::Operation;
}
