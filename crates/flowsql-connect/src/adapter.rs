//! SQL Operation Adapter
//!
//! The invocation entry point: opens one connection from the host's
//! credentials, runs the selected operation against it, and returns a
//! batch of output items. Exactly one connection is opened and exactly
//! one is closed per invocation, on every exit path:
//!
//! - success: the branch result is returned after a single close
//! - failure with continue-on-failure: a single error-describing item
//!   is returned, the close happening on the same shared exit path
//! - failure without continue-on-failure: the connection is closed
//!   immediately and the error propagates
//!
//! Within the execute-query and update branches all per-item statements
//! are issued concurrently; the adapter awaits every in-flight
//! execution before surfacing the first failure in input order, and
//! assembles results in input order regardless of completion order.

use std::sync::Arc;

use futures::future;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use flowsql_rdbc::prelude::*;

use crate::items::{rows_to_items, Item, JsonMap};
use crate::operation::{
    ExecuteQueryConfig, InsertConfig, Operation, StoredProcedureConfig, UpdateConfig,
};
use crate::statement::{
    build_call_statement, build_insert_statement, build_update_statement, ensure_update_key,
    flatten_insert_binds, parse_columns, procedure_binds, update_binds,
};

/// One host invocation: a selected operation, its parameter bag, and a
/// batch of input items.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Host-selected operation name
    pub operation: String,
    /// Loosely-typed per-operation parameters
    pub parameters: serde_json::Value,
    /// Input records, in order
    pub items: Vec<Item>,
    /// Convert failures into a single error-describing output item
    /// instead of aborting the invocation
    pub continue_on_fail: bool,
}

impl Invocation {
    /// Create an invocation for an operation with its parameters
    pub fn new(operation: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            operation: operation.into(),
            parameters,
            items: Vec::new(),
            continue_on_fail: false,
        }
    }

    /// Attach the input batch
    pub fn with_items(mut self, items: Vec<Item>) -> Self {
        self.items = items;
        self
    }

    /// Set the continue-on-failure flag
    pub fn continue_on_fail(mut self, continue_on_fail: bool) -> Self {
        self.continue_on_fail = continue_on_fail;
        self
    }
}

/// Outcome of a credential test, rendered by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialTestResult {
    /// Overall status
    pub status: CredentialTestStatus,
    /// Human-readable detail
    pub message: String,
}

impl CredentialTestResult {
    /// Successful connection test
    pub fn ok() -> Self {
        Self {
            status: CredentialTestStatus::Ok,
            message: "Connection successful!".to_string(),
        }
    }

    /// Failed connection test
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: CredentialTestStatus::Error,
            message: message.into(),
        }
    }
}

/// Status of a credential test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialTestStatus {
    /// Connection established and closed
    #[serde(rename = "OK")]
    Ok,
    /// Connection failed
    Error,
}

/// A table offered to the host's table picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCandidate {
    /// Display name
    pub name: String,
    /// Selection value
    pub value: String,
}

/// The SQL operation adapter, parameterized over a driver factory
pub struct SqlOperationAdapter {
    factory: Arc<dyn ConnectionFactory>,
}

impl SqlOperationAdapter {
    /// Create an adapter over a connection factory
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self { factory }
    }

    /// Run one invocation against a fresh connection.
    ///
    /// See the module docs for the connection-lifetime contract.
    pub async fn run(
        &self,
        credentials: &SqlCredentials,
        invocation: &Invocation,
    ) -> Result<Vec<Item>> {
        let conn = self.factory.connect(credentials).await?;
        info!(
            operation = %invocation.operation,
            items = invocation.items.len(),
            database = %self.factory.database_type(),
            "Running SQL operation"
        );

        let outcome = self.dispatch(conn.as_ref(), invocation).await;

        let items = match outcome {
            Ok(items) => items,
            Err(err) if invocation.continue_on_fail => {
                warn!(error = %err, "Operation failed; continuing with error item");
                vec![Item::error(err.to_string())]
            }
            Err(err) => {
                if let Err(close_err) = conn.close().await {
                    warn!(error = %close_err, "Failed to close connection after error");
                }
                return Err(err);
            }
        };

        conn.close().await?;
        info!(items = items.len(), "SQL operation finished");
        Ok(items)
    }

    /// Resolve the operation and run the matching branch.
    ///
    /// Resolution happens here so an unsupported operation name flows
    /// through the same error policy as a failing statement, before any
    /// statement is executed.
    async fn dispatch(&self, conn: &dyn Connection, invocation: &Invocation) -> Result<Vec<Item>> {
        let operation = Operation::resolve(&invocation.operation, &invocation.parameters)?;
        debug!(operation = operation.name(), "Operation resolved");

        match operation {
            Operation::ExecuteQuery(config) => {
                self.execute_query(conn, &config, &invocation.items).await
            }
            Operation::ExecuteStoredProcedure(config) => {
                self.execute_stored_procedure(conn, &config).await
            }
            Operation::Insert(config) => self.insert(conn, &config, &invocation.items).await,
            Operation::Update(config) => self.update(conn, &config, &invocation.items).await,
        }
    }

    /// execute-query: one query per input item, all issued concurrently,
    /// results concatenated in input order and tagged with the
    /// originating item index.
    async fn execute_query(
        &self,
        conn: &dyn Connection,
        config: &ExecuteQueryConfig,
        items: &[Item],
    ) -> Result<Vec<Item>> {
        let executions = items.iter().enumerate().map(|(index, _)| async move {
            let sql = config.query_for(index)?;
            debug!(item = index, sql, "Executing query");
            conn.query(sql, &[]).await
        });

        // Await every in-flight query, then surface the first failure in
        // input order. No early cancel of siblings.
        let results = future::join_all(executions).await;

        let mut output = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            output.extend(rows_to_items(result?, Some(index)));
        }
        Ok(output)
    }

    /// execute-stored-procedure: one call for the whole invocation,
    /// producing exactly one item of OUT-parameter values.
    async fn execute_stored_procedure(
        &self,
        conn: &dyn Connection,
        config: &StoredProcedureConfig,
    ) -> Result<Vec<Item>> {
        let binds = procedure_binds(config);
        let statement = build_call_statement(&config.procedure, &binds);
        debug!(statement, "Calling stored procedure");

        let out_binds = conn.call(&statement, &binds).await?;

        let mut json = JsonMap::new();
        for out_param in &config.parameters.outputs {
            let value = out_binds
                .get(&out_param.name)
                .cloned()
                .unwrap_or(Value::Null);
            json.insert(out_param.name.clone(), value.into_json());
        }
        Ok(vec![Item::new(json)])
    }

    /// insert: one multi-row statement for the whole batch; the output
    /// is the driver's insert-result metadata, not the input data.
    async fn insert(
        &self,
        conn: &dyn Connection,
        config: &InsertConfig,
        items: &[Item],
    ) -> Result<Vec<Item>> {
        // An empty batch would render a malformed VALUES clause
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let columns = parse_columns(&config.columns);
        let sql = build_insert_statement(config.table.value(), &columns, items.len(), &config.options);
        let binds = flatten_insert_binds(items, &columns);
        debug!(sql, binds = binds.len(), "Executing insert");

        let result = conn.execute(&sql, &binds).await?;
        Ok(vec![exec_result_item(result)])
    }

    /// update: one statement per input item, all issued concurrently,
    /// results collected in input order.
    async fn update(
        &self,
        conn: &dyn Connection,
        config: &UpdateConfig,
        items: &[Item],
    ) -> Result<Vec<Item>> {
        let mut columns = parse_columns(&config.columns);
        ensure_update_key(&mut columns, &config.update_key);
        let sql = build_update_statement(config.table.value(), &columns, &config.update_key);
        debug!(sql, items = items.len(), "Executing updates");

        let executions = items.iter().map(|item| {
            let binds = update_binds(&item.json, &columns, &config.update_key);
            let sql = sql.as_str();
            async move { conn.execute(sql, &binds).await }
        });

        let results = future::join_all(executions).await;

        let mut output = Vec::with_capacity(items.len());
        for result in results {
            output.push(exec_result_item(result?));
        }
        Ok(output)
    }

    /// Test host credentials by opening and closing a connection.
    ///
    /// Failures are folded into the result for the host to render; this
    /// never returns an error.
    pub async fn test_credentials(&self, credentials: &SqlCredentials) -> CredentialTestResult {
        match self.factory.connect(credentials).await {
            Ok(conn) => match conn.close().await {
                Ok(()) => CredentialTestResult::ok(),
                Err(err) => CredentialTestResult::failed(err.to_string()),
            },
            Err(err) => CredentialTestResult::failed(err.to_string()),
        }
    }

    /// List tables for the host's table picker.
    pub async fn search_tables(
        &self,
        credentials: &SqlCredentials,
    ) -> Result<Vec<TableCandidate>> {
        let conn = self.factory.connect(credentials).await?;
        let result = conn.query("SELECT table_name FROM user_tables", &[]).await;
        let close_result = conn.close().await;

        let rows = result?;
        close_result?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.get(0).and_then(|v| v.as_str().map(str::to_owned)))
            .map(|name| TableCandidate {
                value: name.clone(),
                name,
            })
            .collect())
    }
}

/// Render driver statement metadata as an output item
fn exec_result_item(result: ExecResult) -> Item {
    let mut json = JsonMap::new();
    json.insert(
        "rowsAffected".to_string(),
        serde_json::Value::from(result.rows_affected),
    );
    if let Some(id) = result.last_insert_id {
        json.insert("lastInsertId".to_string(), serde_json::Value::from(id));
    }
    Item::new(json)
}
