//! Statement building
//!
//! Pure functions assembling SQL text and bind lists from typed
//! operation configs and input items. Values are always bound, never
//! interpolated; table and column names are interpolated verbatim, a
//! known limitation inherited from the source behavior (the host is
//! trusted for identifiers).

use flowsql_rdbc::{ProcedureBind, Value};

use crate::items::{Item, JsonMap};
use crate::operation::{InsertOptions, StoredProcedureConfig};

/// Split a comma-separated column list, trimming each name and dropping
/// empty entries.
pub fn parse_columns(spec: &str) -> Vec<String> {
    spec.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Project the listed columns out of a record in column order, binding
/// NULL for fields the record does not carry.
pub fn project_values(json: &JsonMap, columns: &[String]) -> Vec<Value> {
    columns
        .iter()
        .map(|column| json.get(column).map(Value::from_json).unwrap_or(Value::Null))
        .collect()
}

/// Prepend the update key to the column list when it is not already
/// present.
pub fn ensure_update_key(columns: &mut Vec<String>, update_key: &str) {
    if !columns.iter().any(|c| c == update_key) {
        columns.insert(0, update_key.to_string());
    }
}

/// Build one multi-row INSERT statement with a `(?,...)` placeholder
/// group per input record.
pub fn build_insert_statement(
    table: &str,
    columns: &[String],
    row_count: usize,
    options: &InsertOptions,
) -> String {
    let group = format!("({})", vec!["?"; columns.len()].join(","));
    let groups = vec![group; row_count].join(",");

    let mut head = String::from("INSERT");
    if let Some(priority) = &options.priority {
        head.push(' ');
        head.push_str(priority.as_sql());
    }
    if options.ignore {
        head.push_str(" IGNORE");
    }

    format!(
        "{} INTO {}({}) VALUES {};",
        head,
        table,
        columns.join(","),
        groups
    )
}

/// Flatten the projected values of every record, in record order then
/// column order, into one positional bind list for the multi-row INSERT.
pub fn flatten_insert_binds(items: &[Item], columns: &[String]) -> Vec<Value> {
    items
        .iter()
        .flat_map(|item| project_values(&item.json, columns))
        .collect()
}

/// Build the per-record UPDATE statement.
pub fn build_update_statement(table: &str, columns: &[String], update_key: &str) -> String {
    let assignments: Vec<String> = columns.iter().map(|c| format!("{} = ?", c)).collect();
    format!(
        "UPDATE {} SET {} WHERE {} = ?;",
        table,
        assignments.join(", "),
        update_key
    )
}

/// Bind list for one UPDATE: the projected values in column order, then
/// the record's update-key value appended again for the WHERE clause.
/// The duplication is required by the positional-placeholder form.
pub fn update_binds(json: &JsonMap, columns: &[String], update_key: &str) -> Vec<Value> {
    let mut binds = project_values(json, columns);
    binds.push(
        json.get(update_key)
            .map(Value::from_json)
            .unwrap_or(Value::Null),
    );
    binds
}

/// Build the ordered IN-then-OUT bind list for a stored-procedure call.
pub fn procedure_binds(config: &StoredProcedureConfig) -> Vec<ProcedureBind> {
    let mut binds: Vec<ProcedureBind> = config
        .parameters
        .inputs
        .iter()
        .map(|p| ProcedureBind::input(p.name.as_str(), Value::from_json(&p.value)))
        .collect();
    binds.extend(
        config
            .parameters
            .outputs
            .iter()
            .map(|p| ProcedureBind::output(p.name.as_str())),
    );
    binds
}

/// Build the call statement `BEGIN <procedure>(:a, :b, ...); END;` with
/// one named placeholder per bind, in bind order.
pub fn build_call_statement(procedure: &str, binds: &[ProcedureBind]) -> String {
    let placeholders: Vec<String> = binds.iter().map(|b| format!(":{}", b.name)).collect();
    format!("BEGIN {}({}); END;", procedure, placeholders.join(", "))
}
