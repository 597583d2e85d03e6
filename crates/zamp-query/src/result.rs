//! Normalization of backend-native result shapes into [`QueryResult`]
//!
//! Two shapes are supported:
//! - row cursors (SQL drivers): a column list read once from the cursor
//!   metadata plus positional rows, see [`from_rows`]
//! - broker JSON responses (Pinot), see [`from_broker_response`]
//!
//! Both paths finish with the same best-effort pass that decodes
//! string-valued array columns into JSON lists.

use crate::error::{DataError, Result};
use crate::types::{ColumnMetadata, DataRow, QueryResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pinot broker `/query/sql` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerResponse {
    #[serde(default)]
    pub result_table: Option<ResultTable>,
    #[serde(default)]
    pub exceptions: Vec<BrokerException>,
    #[serde(default)]
    pub num_docs_scanned: Option<u64>,
    #[serde(default)]
    pub time_used_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultTable {
    pub data_schema: DataSchema,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSchema {
    #[serde(default)]
    pub column_names: Vec<String>,
    #[serde(default)]
    pub column_data_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerException {
    #[serde(default)]
    pub error_code: i32,
    #[serde(default)]
    pub message: String,
}

const BROKER_NUMERIC_TYPES: &[&str] = &["INT", "LONG", "FLOAT", "DOUBLE", "BIG_DECIMAL"];

/// Build a result from a row cursor
///
/// `columns` comes from the cursor metadata and is independent of the number
/// of rows. Missing trailing cells become `null`.
pub fn from_rows(columns: Vec<ColumnMetadata>, rows: Vec<Vec<Value>>) -> QueryResult {
    let rows = rows
        .into_iter()
        .map(|cells| {
            let mut cells = cells.into_iter();
            columns
                .iter()
                .map(|column| (column.name.clone(), cells.next().unwrap_or(Value::Null)))
                .collect::<DataRow>()
        })
        .collect();

    let mut result = QueryResult::new(rows, columns);
    parse_array_columns(&mut result);
    result
}

/// Build a result from a broker JSON response
pub fn from_broker_response(response: &BrokerResponse) -> Result<QueryResult> {
    let table = response
        .result_table
        .as_ref()
        .ok_or(DataError::ResultTableMissing)?;

    let schema = &table.data_schema;
    if schema.column_names.is_empty() {
        return Err(DataError::NoColumns);
    }

    if !response.exceptions.is_empty() {
        let detail = serde_json::to_string(&response.exceptions)
            .map_err(|e| DataError::json_decode("broker exceptions", e))?;
        return Err(DataError::QueryExceptions(detail));
    }

    let columns: Vec<ColumnMetadata> = schema
        .column_names
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let data_type = schema
                .column_data_types
                .get(idx)
                .cloned()
                .unwrap_or_else(|| "STRING".to_string());
            ColumnMetadata::new(name.clone(), data_type)
        })
        .collect();

    let mut rows = Vec::with_capacity(table.rows.len());
    for cells in &table.rows {
        let mut row = DataRow::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            let raw = cells.get(idx).cloned().unwrap_or(Value::Null);
            row.insert(column.name.clone(), normalize_broker_value(column, raw)?);
        }
        rows.push(row);
    }

    let mut result = QueryResult::new(rows, columns);
    parse_array_columns(&mut result);
    Ok(result)
}

fn normalize_broker_value(column: &ColumnMetadata, raw: Value) -> Result<Value> {
    let numeric = BROKER_NUMERIC_TYPES
        .iter()
        .any(|t| column.native_type.eq_ignore_ascii_case(t));

    match raw {
        Value::String(s) if numeric => parse_numeric(&column.name, &s),
        other => Ok(other),
    }
}

/// Decode a numeric value serialized as a string: integer first, then float
pub fn parse_numeric(column: &str, raw: &str) -> Result<Value> {
    let trimmed = raw.trim();

    if let Ok(i) = trimmed.parse::<i64>() {
        return Ok(Value::from(i));
    }

    trimmed
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| DataError::InvalidNumericValue {
            column: column.to_string(),
            value: raw.to_string(),
        })
}

/// Decode string values of array-typed columns into JSON lists
///
/// Values that do not parse as a JSON array are left untouched.
pub fn parse_array_columns(result: &mut QueryResult) {
    let array_columns: Vec<&str> = result
        .columns
        .iter()
        .filter(|c| c.is_array())
        .map(|c| c.name.as_str())
        .collect();

    if array_columns.is_empty() {
        return;
    }

    for row in result.rows.iter_mut() {
        for name in &array_columns {
            if let Some(value) = row.get_mut(*name) {
                if let Value::String(s) = value {
                    if let Ok(parsed @ Value::Array(_)) = serde_json::from_str::<Value>(s) {
                        *value = parsed;
                    }
                }
            }
        }
    }
}
