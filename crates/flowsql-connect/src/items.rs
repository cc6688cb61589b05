//! Host item format
//!
//! The host exchanges batches of items: ordered field-name→value
//! mappings, optionally tagged with the index of the input item that
//! produced them (provenance tracking on the host side).

use flowsql_rdbc::Row;
use serde::{Deserialize, Serialize};

/// Ordered field-name→value mapping, the host's record shape.
///
/// `serde_json` is built with `preserve_order`, so insertion order is
/// the field order the host sees.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// One record exchanged with the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Record fields in order
    pub json: JsonMap,

    /// Index of the input item this output was produced from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_item: Option<usize>,
}

impl Item {
    /// Create an item from a field mapping
    pub fn new(json: JsonMap) -> Self {
        Self {
            json,
            source_item: None,
        }
    }

    /// Build an item from a database row, tagged with its source index
    pub fn from_row(row: Row, source_item: Option<usize>) -> Self {
        Self {
            json: row.into_json_map(),
            source_item,
        }
    }

    /// Build the single error-describing item emitted under
    /// continue-on-failure
    pub fn error(message: impl Into<String>) -> Self {
        let mut json = JsonMap::new();
        json.insert(
            "error".to_string(),
            serde_json::Value::String(message.into()),
        );
        Self::new(json)
    }

    /// Read a field value, if present
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.json.get(field)
    }
}

impl From<JsonMap> for Item {
    fn from(json: JsonMap) -> Self {
        Self::new(json)
    }
}

/// Convert a batch of rows into items, all tagged with one source index
pub fn rows_to_items(rows: Vec<Row>, source_item: Option<usize>) -> Vec<Item> {
    rows.into_iter()
        .map(|row| Item::from_row(row, source_item))
        .collect()
}
