//! Operation selection and per-operation configuration
//!
//! The host selects one operation per invocation by name and supplies a
//! loosely-typed parameter bag. Resolution turns that pair into a
//! tagged union over the four supported operations, each carrying its
//! own strongly-typed config, so the branches read settled values
//! instead of re-parsing the bag ad hoc.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use flowsql_rdbc::{Error, Result};

/// The four supported operations, resolved once at invocation entry
#[derive(Debug, Clone)]
pub enum Operation {
    /// Execute a raw SQL query per input item
    ExecuteQuery(ExecuteQueryConfig),
    /// Call a stored procedure with IN/OUT parameters
    ExecuteStoredProcedure(StoredProcedureConfig),
    /// Insert all input items as rows in one statement
    Insert(InsertConfig),
    /// Update one row per input item
    Update(UpdateConfig),
}

impl Operation {
    /// Resolve a host-selected operation name and parameter bag into a
    /// typed operation.
    ///
    /// Unknown names fail with an unsupported-operation error before
    /// any statement is built or executed.
    pub fn resolve(name: &str, parameters: &serde_json::Value) -> Result<Self> {
        let operation = match name {
            "executeQuery" | "execute-query" => {
                Self::ExecuteQuery(deserialize_config(parameters)?)
            }
            "executeStoredProcedure" | "execute-stored-procedure" => {
                let config: StoredProcedureConfig = deserialize_config(parameters)?;
                config
                    .validate()
                    .map_err(|e| Error::config(format!("Invalid procedure config: {}", e)))?;
                Self::ExecuteStoredProcedure(config)
            }
            "insert" => Self::Insert(deserialize_config(parameters)?),
            "update" => Self::Update(deserialize_config(parameters)?),
            other => {
                return Err(Error::unsupported(format!(
                    "The operation \"{}\" is not supported!",
                    other
                )))
            }
        };
        Ok(operation)
    }

    /// Canonical operation name, for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExecuteQuery(_) => "executeQuery",
            Self::ExecuteStoredProcedure(_) => "executeStoredProcedure",
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
        }
    }
}

fn deserialize_config<T: serde::de::DeserializeOwned>(parameters: &serde_json::Value) -> Result<T> {
    serde_json::from_value(parameters.clone())
        .map_err(|e| Error::config(format!("Invalid operation parameters: {}", e)))
}

/// Configuration for the execute-query operation.
///
/// The query text is a host-configured expression that may vary per
/// item, so the config carries one entry per input item index. A single
/// entry broadcasts to every item.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteQueryConfig {
    /// Query text per input item index
    #[serde(alias = "query", deserialize_with = "string_or_list")]
    pub queries: Vec<String>,
}

impl ExecuteQueryConfig {
    /// Query text for the given item index
    pub fn query_for(&self, index: usize) -> Result<&str> {
        if self.queries.len() == 1 {
            return Ok(&self.queries[0]);
        }
        self.queries
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| Error::config(format!("No query configured for item {}", index)))
    }
}

fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(query) => vec![query],
        OneOrMany::Many(queries) => queries,
    })
}

/// Configuration for the execute-stored-procedure operation
#[derive(Debug, Clone, Serialize, Deserialize, Validate, JsonSchema)]
pub struct StoredProcedureConfig {
    /// Stored procedure name
    #[serde(alias = "storedProcedure")]
    #[validate(length(min = 1))]
    pub procedure: String,

    /// Declared IN/OUT parameters
    #[serde(default, alias = "procedureParameters")]
    pub parameters: ProcedureParameters,
}

/// Declared stored-procedure parameters, partitioned by direction
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProcedureParameters {
    /// IN parameters (name and literal value)
    #[serde(default, rename = "in")]
    pub inputs: Vec<InParameter>,

    /// OUT parameters (name only; value populated by the call)
    #[serde(default, rename = "out")]
    pub outputs: Vec<OutParameter>,
}

/// A declared IN parameter
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InParameter {
    /// Placeholder name
    pub name: String,
    /// Literal value supplied by the host
    #[serde(default)]
    pub value: serde_json::Value,
}

/// A declared OUT parameter
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OutParameter {
    /// Placeholder name
    pub name: String,
}

/// Target table reference: either picked from a list or typed as a
/// free-text name (the host's resource-locator shape), or a bare string.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TableRef {
    /// Host resource-locator form `{ "mode": ..., "value": ... }`
    Locator {
        /// How the table was selected
        mode: TableRefMode,
        /// The table name
        value: String,
    },
    /// Plain table name
    Name(String),
}

impl TableRef {
    /// The resolved table name
    pub fn value(&self) -> &str {
        match self {
            Self::Locator { value, .. } => value,
            Self::Name(value) => value,
        }
    }
}

/// Selection mode of a [`TableRef`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TableRefMode {
    /// Selected from the table list
    List,
    /// Entered as a free-text name
    Name,
}

/// Configuration for the insert operation
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InsertConfig {
    /// Target table
    pub table: TableRef,

    /// Comma-separated column list; names are trimmed
    #[serde(default)]
    pub columns: String,

    /// INSERT statement modifiers
    #[serde(default)]
    pub options: InsertOptions,
}

/// Modifiers for the INSERT statement
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct InsertOptions {
    /// Emit the IGNORE keyword to suppress ignorable constraint errors
    #[serde(default)]
    pub ignore: bool,

    /// Priority keyword emitted verbatim after INSERT
    #[serde(default)]
    pub priority: Option<InsertPriority>,
}

/// INSERT priority modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum InsertPriority {
    /// Delay until no other clients are reading from the table
    #[serde(rename = "LOW_PRIORITY")]
    Low,
    /// Override low-priority-updates and disable concurrent inserts
    #[serde(rename = "HIGH_PRIORITY")]
    High,
}

impl InsertPriority {
    /// The SQL keyword emitted into the statement
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Low => "LOW_PRIORITY",
            Self::High => "HIGH_PRIORITY",
        }
    }
}

impl std::fmt::Display for InsertPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// Configuration for the update operation
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdateConfig {
    /// Target table
    pub table: TableRef,

    /// Column deciding which rows to update
    #[serde(default = "default_update_key", alias = "updateKey")]
    pub update_key: String,

    /// Comma-separated column list; names are trimmed
    #[serde(default)]
    pub columns: String,
}

fn default_update_key() -> String {
    "id".to_string()
}
