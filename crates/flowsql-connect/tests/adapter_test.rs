//! Adapter integration tests against a scripted stub driver.
//!
//! The stub records every statement it is handed and counts connection
//! closes, so the tests can assert the connection-lifetime contract and
//! the exact SQL and binds each operation produces.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use flowsql_connect::prelude::*;
use flowsql_rdbc::{
    Connection, ConnectionFactory, DatabaseType, Error, ExecResult, OutBinds, ProcedureBind,
    Result, Row, SqlCredentials, Value,
};

#[derive(Debug, Default)]
struct StubState {
    queries: Vec<String>,
    executes: Vec<(String, Vec<Value>)>,
    calls: Vec<(String, Vec<ProcedureBind>)>,
    close_count: usize,
    connect_count: usize,
}

#[derive(Default)]
struct StubFactory {
    state: Arc<Mutex<StubState>>,
    /// Rows returned for every query
    rows: Vec<Row>,
    /// Queries that fail instead of returning rows
    fail_queries: HashSet<String>,
    /// OUT values reported for stored-procedure calls
    out_values: Vec<(String, Value)>,
    /// Metadata returned for every execute
    exec_result: ExecResult,
    fail_connect: bool,
}

impl StubFactory {
    fn new() -> Self {
        Self::default()
    }

    fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    fn with_failing_query(mut self, sql: &str) -> Self {
        self.fail_queries.insert(sql.to_string());
        self
    }

    fn with_out_values(mut self, values: Vec<(String, Value)>) -> Self {
        self.out_values = values;
        self
    }

    fn with_exec_result(mut self, result: ExecResult) -> Self {
        self.exec_result = result;
        self
    }

    fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    fn state(&self) -> Arc<Mutex<StubState>> {
        Arc::clone(&self.state)
    }
}

struct StubConnection {
    state: Arc<Mutex<StubState>>,
    rows: Vec<Row>,
    fail_queries: HashSet<String>,
    out_values: Vec<(String, Value)>,
    exec_result: ExecResult,
}

#[async_trait]
impl Connection for StubConnection {
    async fn query(&self, sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
        self.state.lock().unwrap().queries.push(sql.to_string());
        if self.fail_queries.contains(sql) {
            return Err(Error::query(format!("query failed: {}", sql)));
        }
        Ok(self.rows.clone())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        self.state
            .lock()
            .unwrap()
            .executes
            .push((sql.to_string(), params.to_vec()));
        Ok(self.exec_result)
    }

    async fn call(&self, statement: &str, binds: &[ProcedureBind]) -> Result<OutBinds> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push((statement.to_string(), binds.to_vec()));
        Ok(OutBinds::from(self.out_values.clone()))
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().unwrap().close_count += 1;
        Ok(())
    }
}

#[async_trait]
impl ConnectionFactory for StubFactory {
    async fn connect(&self, _credentials: &SqlCredentials) -> Result<Box<dyn Connection>> {
        if self.fail_connect {
            return Err(Error::connection("connect refused"));
        }
        let mut state = self.state.lock().unwrap();
        state.connect_count += 1;
        Ok(Box::new(StubConnection {
            state: Arc::clone(&self.state),
            rows: self.rows.clone(),
            fail_queries: self.fail_queries.clone(),
            out_values: self.out_values.clone(),
            exec_result: self.exec_result,
        }))
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Unknown
    }
}

/// Connection whose driver handle lives behind an exclusive async
/// checkout, the way a single-session driver serializes statements:
/// overlapping statements queue on the lock, and the handle is gone
/// only after close. A fan-out that assumes unlimited statement
/// concurrency from one connection fails against this stub.
struct SerializingStubConnection {
    state: Arc<Mutex<StubState>>,
    slot: tokio::sync::Mutex<Option<()>>,
    rows: Vec<Row>,
}

impl SerializingStubConnection {
    fn new(state: Arc<Mutex<StubState>>, rows: Vec<Row>) -> Self {
        Self {
            state,
            slot: tokio::sync::Mutex::new(Some(())),
            rows,
        }
    }
}

#[async_trait]
impl Connection for SerializingStubConnection {
    async fn query(&self, sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
        let mut guard = self.slot.lock().await;
        guard
            .as_mut()
            .ok_or_else(|| Error::connection("Connection is closed"))?;
        // Statement in flight; siblings must wait on the lock
        tokio::task::yield_now().await;
        self.state.lock().unwrap().queries.push(sql.to_string());
        Ok(self.rows.clone())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let mut guard = self.slot.lock().await;
        guard
            .as_mut()
            .ok_or_else(|| Error::connection("Connection is closed"))?;
        tokio::task::yield_now().await;
        self.state
            .lock()
            .unwrap()
            .executes
            .push((sql.to_string(), params.to_vec()));
        Ok(ExecResult {
            rows_affected: 1,
            last_insert_id: None,
        })
    }

    async fn call(&self, _statement: &str, _binds: &[ProcedureBind]) -> Result<OutBinds> {
        Err(Error::unsupported("no out binds"))
    }

    async fn close(&self) -> Result<()> {
        self.slot
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::connection("Connection is closed"))?;
        self.state.lock().unwrap().close_count += 1;
        Ok(())
    }
}

#[derive(Default)]
struct SerializingStubFactory {
    state: Arc<Mutex<StubState>>,
    rows: Vec<Row>,
}

#[async_trait]
impl ConnectionFactory for SerializingStubFactory {
    async fn connect(&self, _credentials: &SqlCredentials) -> Result<Box<dyn Connection>> {
        self.state.lock().unwrap().connect_count += 1;
        Ok(Box::new(SerializingStubConnection::new(
            Arc::clone(&self.state),
            self.rows.clone(),
        )))
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Unknown
    }
}

fn credentials() -> SqlCredentials {
    SqlCredentials::new("app", "secret", "db.example.com:3306/app")
}

fn record(value: serde_json::Value) -> Item {
    match value {
        serde_json::Value::Object(map) => Item::new(map),
        _ => unreachable!(),
    }
}

fn empty_items(count: usize) -> Vec<Item> {
    (0..count).map(|_| record(json!({}))).collect()
}

#[tokio::test]
async fn test_execute_query_per_item_tagged_in_order() {
    let factory = StubFactory::new().with_rows(vec![
        Row::new(vec!["id".into()], vec![Value::Int64(1)]),
        Row::new(vec!["id".into()], vec![Value::Int64(2)]),
    ]);
    let state = factory.state();
    let adapter = SqlOperationAdapter::new(Arc::new(factory));

    let invocation = Invocation::new("executeQuery", json!({"query": "SELECT id FROM t"}))
        .with_items(empty_items(3));
    let items = adapter.run(&credentials(), &invocation).await.unwrap();

    // Two rows per input item, concatenated in input order
    assert_eq!(items.len(), 6);
    let tags: Vec<Option<usize>> = items.iter().map(|i| i.source_item).collect();
    assert_eq!(
        tags,
        vec![Some(0), Some(0), Some(1), Some(1), Some(2), Some(2)]
    );

    let state = state.lock().unwrap();
    assert_eq!(state.queries.len(), 3);
    assert_eq!(state.close_count, 1);
}

#[tokio::test]
async fn test_execute_query_per_item_query_list() {
    let factory = StubFactory::new();
    let state = factory.state();
    let adapter = SqlOperationAdapter::new(Arc::new(factory));

    let invocation = Invocation::new(
        "executeQuery",
        json!({"queries": ["SELECT 1", "SELECT 2"]}),
    )
    .with_items(empty_items(2));
    adapter.run(&credentials(), &invocation).await.unwrap();

    let state = state.lock().unwrap();
    assert_eq!(state.queries, vec!["SELECT 1", "SELECT 2"]);
}

#[tokio::test]
async fn test_execute_query_failure_aborts_after_close() {
    let factory = StubFactory::new().with_failing_query("SELECT boom");
    let state = factory.state();
    let adapter = SqlOperationAdapter::new(Arc::new(factory));

    let invocation = Invocation::new("executeQuery", json!({"query": "SELECT boom"}))
        .with_items(empty_items(2));
    let err = adapter.run(&credentials(), &invocation).await.unwrap_err();
    assert!(err.to_string().contains("query failed"));

    let state = state.lock().unwrap();
    // All in-flight queries were awaited before the failure surfaced
    assert_eq!(state.queries.len(), 2);
    assert_eq!(state.close_count, 1);
}

#[tokio::test]
async fn test_continue_on_fail_yields_single_error_item() {
    let factory = StubFactory::new().with_failing_query("SELECT boom");
    let state = factory.state();
    let adapter = SqlOperationAdapter::new(Arc::new(factory));

    let invocation = Invocation::new("executeQuery", json!({"query": "SELECT boom"}))
        .with_items(empty_items(3))
        .continue_on_fail(true);
    let items = adapter.run(&credentials(), &invocation).await.unwrap();

    assert_eq!(items.len(), 1);
    let message = items[0].get("error").and_then(|v| v.as_str()).unwrap();
    assert!(message.contains("query failed"));
    assert_eq!(state.lock().unwrap().close_count, 1);
}

#[tokio::test]
async fn test_unsupported_operation_closes_once() {
    let factory = StubFactory::new();
    let state = factory.state();
    let adapter = SqlOperationAdapter::new(Arc::new(factory));

    let invocation = Invocation::new("delete", json!({})).with_items(empty_items(1));
    let err = adapter.run(&credentials(), &invocation).await.unwrap_err();
    assert_eq!(err.to_string(), "The operation \"delete\" is not supported!");

    let state = state.lock().unwrap();
    assert!(state.queries.is_empty());
    assert!(state.executes.is_empty());
    assert_eq!(state.close_count, 1);
}

#[tokio::test]
async fn test_unsupported_operation_with_continue_on_fail() {
    let factory = StubFactory::new();
    let state = factory.state();
    let adapter = SqlOperationAdapter::new(Arc::new(factory));

    let invocation = Invocation::new("delete", json!({}))
        .with_items(empty_items(1))
        .continue_on_fail(true);
    let items = adapter.run(&credentials(), &invocation).await.unwrap();

    assert_eq!(
        items[0].get("error"),
        Some(&json!("The operation \"delete\" is not supported!"))
    );
    assert_eq!(state.lock().unwrap().close_count, 1);
}

#[tokio::test]
async fn test_insert_single_statement_flattened_binds() {
    let factory = StubFactory::new().with_exec_result(ExecResult {
        rows_affected: 2,
        last_insert_id: Some(11),
    });
    let state = factory.state();
    let adapter = SqlOperationAdapter::new(Arc::new(factory));

    let invocation = Invocation::new(
        "insert",
        json!({"table": {"mode": "list", "value": "product"}, "columns": "id, name"}),
    )
    .with_items(vec![
        record(json!({"id": 1, "name": "a"})),
        record(json!({"id": 2, "name": "b"})),
    ]);
    let items = adapter.run(&credentials(), &invocation).await.unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].get("rowsAffected"), Some(&json!(2)));
    assert_eq!(items[0].get("lastInsertId"), Some(&json!(11)));

    let state = state.lock().unwrap();
    assert_eq!(state.executes.len(), 1);
    let (sql, binds) = &state.executes[0];
    assert_eq!(sql, "INSERT INTO product(id,name) VALUES (?,?),(?,?);");
    assert_eq!(
        binds,
        &vec![
            Value::Int64(1),
            Value::String("a".into()),
            Value::Int64(2),
            Value::String("b".into()),
        ]
    );
    assert_eq!(state.close_count, 1);
}

#[tokio::test]
async fn test_insert_modifiers_and_null_fill() {
    let factory = StubFactory::new();
    let state = factory.state();
    let adapter = SqlOperationAdapter::new(Arc::new(factory));

    let invocation = Invocation::new(
        "insert",
        json!({
            "table": "t",
            "columns": "id,name",
            "options": {"ignore": true, "priority": "LOW_PRIORITY"}
        }),
    )
    .with_items(vec![record(json!({"id": 1}))]);
    adapter.run(&credentials(), &invocation).await.unwrap();

    let state = state.lock().unwrap();
    let (sql, binds) = &state.executes[0];
    assert_eq!(sql, "INSERT LOW_PRIORITY IGNORE INTO t(id,name) VALUES (?,?);");
    assert_eq!(binds, &vec![Value::Int64(1), Value::Null]);
}

#[tokio::test]
async fn test_update_per_item_with_key_duplicated() {
    let factory = StubFactory::new().with_exec_result(ExecResult {
        rows_affected: 1,
        last_insert_id: None,
    });
    let state = factory.state();
    let adapter = SqlOperationAdapter::new(Arc::new(factory));

    let invocation = Invocation::new(
        "update",
        json!({"table": "product", "updateKey": "id", "columns": "name,description"}),
    )
    .with_items(vec![
        record(json!({"id": 7, "name": "x", "description": "y"})),
        record(json!({"id": 8, "name": "z", "description": "w"})),
    ]);
    let items = adapter.run(&credentials(), &invocation).await.unwrap();

    // One result item per input item
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.get("rowsAffected") == Some(&json!(1))));

    let state = state.lock().unwrap();
    assert_eq!(state.executes.len(), 2);
    let (sql, binds) = &state.executes[0];
    assert_eq!(
        sql,
        "UPDATE product SET id = ?, name = ?, description = ? WHERE id = ?;"
    );
    // Key value appears in the SET list and again for the WHERE clause
    assert_eq!(
        binds,
        &vec![
            Value::Int64(7),
            Value::String("x".into()),
            Value::String("y".into()),
            Value::Int64(7),
        ]
    );
    assert_eq!(state.close_count, 1);
}

#[tokio::test]
async fn test_stored_procedure_call_and_out_mapping() {
    let factory = StubFactory::new()
        .with_out_values(vec![("p2".to_string(), Value::String("Jane".into()))]);
    let state = factory.state();
    let adapter = SqlOperationAdapter::new(Arc::new(factory));

    let invocation = Invocation::new(
        "executeStoredProcedure",
        json!({
            "storedProcedure": "get_customer_details",
            "procedureParameters": {
                "in": [{"name": "p1", "value": 5}],
                "out": [{"name": "p2"}, {"name": "p3"}]
            }
        }),
    )
    .with_items(empty_items(2));
    let items = adapter.run(&credentials(), &invocation).await.unwrap();

    // One call and one output item regardless of input batch size
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].get("p2"), Some(&json!("Jane")));
    // OUT value the driver did not report maps to null
    assert_eq!(items[0].get("p3"), Some(&json!(null)));

    let state = state.lock().unwrap();
    assert_eq!(state.calls.len(), 1);
    let (statement, binds) = &state.calls[0];
    assert_eq!(statement, "BEGIN get_customer_details(:p1, :p2, :p3); END;");
    assert_eq!(binds[0], ProcedureBind::input("p1", Value::Int64(5)));
    assert!(binds[1].is_output());
    assert!(binds[2].is_output());
    assert_eq!(state.close_count, 1);
}

#[tokio::test]
async fn test_query_fan_out_over_serializing_connection() {
    let factory = SerializingStubFactory {
        rows: vec![Row::new(vec!["id".into()], vec![Value::Int64(1)])],
        ..Default::default()
    };
    let state = Arc::clone(&factory.state);
    let adapter = SqlOperationAdapter::new(Arc::new(factory));

    let invocation = Invocation::new("executeQuery", json!({"query": "SELECT id FROM t"}))
        .with_items(empty_items(3));
    let items = adapter.run(&credentials(), &invocation).await.unwrap();

    // Every per-item query ran; none failed at handle checkout
    assert_eq!(items.len(), 3);
    let state = state.lock().unwrap();
    assert_eq!(state.queries.len(), 3);
    assert_eq!(state.close_count, 1);
}

#[tokio::test]
async fn test_update_fan_out_over_serializing_connection() {
    let factory = SerializingStubFactory::default();
    let state = Arc::clone(&factory.state);
    let adapter = SqlOperationAdapter::new(Arc::new(factory));

    let invocation = Invocation::new(
        "update",
        json!({"table": "product", "columns": "name"}),
    )
    .with_items(vec![
        record(json!({"id": 1, "name": "a"})),
        record(json!({"id": 2, "name": "b"})),
    ]);
    let items = adapter.run(&credentials(), &invocation).await.unwrap();

    assert_eq!(items.len(), 2);
    let state = state.lock().unwrap();
    assert_eq!(state.executes.len(), 2);
    assert_eq!(state.close_count, 1);
}

#[tokio::test]
async fn test_insert_empty_batch_issues_no_statement() {
    let factory = StubFactory::new();
    let state = factory.state();
    let adapter = SqlOperationAdapter::new(Arc::new(factory));

    let invocation = Invocation::new("insert", json!({"table": "t", "columns": "id"}));
    let items = adapter.run(&credentials(), &invocation).await.unwrap();

    assert!(items.is_empty());
    let state = state.lock().unwrap();
    assert!(state.executes.is_empty());
    assert_eq!(state.close_count, 1);
}

#[tokio::test]
async fn test_connect_failure_propagates() {
    let factory = StubFactory::new().failing_connect();
    let adapter = SqlOperationAdapter::new(Arc::new(factory));

    let invocation = Invocation::new("executeQuery", json!({"query": "SELECT 1"}))
        .with_items(empty_items(1));
    let err = adapter.run(&credentials(), &invocation).await.unwrap_err();
    assert!(err.to_string().contains("connect refused"));
}

#[tokio::test]
async fn test_credential_test_ok_and_failed() {
    let factory = StubFactory::new();
    let state = factory.state();
    let adapter = SqlOperationAdapter::new(Arc::new(factory));

    let result = adapter.test_credentials(&credentials()).await;
    assert_eq!(result, CredentialTestResult::ok());
    assert_eq!(state.lock().unwrap().close_count, 1);

    let adapter = SqlOperationAdapter::new(Arc::new(StubFactory::new().failing_connect()));
    let result = adapter.test_credentials(&credentials()).await;
    assert_eq!(result.status, CredentialTestStatus::Error);
    assert!(result.message.contains("connect refused"));
}

#[tokio::test]
async fn test_search_tables_lists_first_column() {
    let factory = StubFactory::new().with_rows(vec![
        Row::new(
            vec!["table_name".into()],
            vec![Value::String("PRODUCT".into())],
        ),
        Row::new(
            vec!["table_name".into()],
            vec![Value::String("ORDERS".into())],
        ),
    ]);
    let state = factory.state();
    let adapter = SqlOperationAdapter::new(Arc::new(factory));

    let tables = adapter.search_tables(&credentials()).await.unwrap();
    assert_eq!(
        tables,
        vec![
            TableCandidate {
                name: "PRODUCT".into(),
                value: "PRODUCT".into()
            },
            TableCandidate {
                name: "ORDERS".into(),
                value: "ORDERS".into()
            },
        ]
    );

    let state = state.lock().unwrap();
    assert_eq!(state.queries, vec!["SELECT table_name FROM user_tables"]);
    assert_eq!(state.close_count, 1);
}

#[tokio::test]
async fn test_search_tables_closes_on_failure() {
    let factory = StubFactory::new().with_failing_query("SELECT table_name FROM user_tables");
    let state = factory.state();
    let adapter = SqlOperationAdapter::new(Arc::new(factory));

    assert!(adapter.search_tables(&credentials()).await.is_err());
    assert_eq!(state.lock().unwrap().close_count, 1);
}
