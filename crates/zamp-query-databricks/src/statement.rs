//! SQL Statement Execution API payloads and cell conversion

use serde::{Deserialize, Serialize};
use serde_json::Value;
use zamp_query::result::parse_numeric;
use zamp_query::ColumnMetadata;

#[derive(Debug, Serialize)]
pub(crate) struct ExecuteStatementRequest<'a> {
    pub statement: &'a str,
    pub warehouse_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<&'a str>,
    pub wait_timeout: String,
    pub on_wait_timeout: &'static str,
    pub disposition: &'static str,
    pub format: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<StatementParameter>,
}

/// Named bind parameter; positional args bind as `p1..pn`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct StatementParameter {
    pub name: String,
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub param_type: &'static str,
}

impl StatementParameter {
    pub(crate) fn from_args(args: &[Value]) -> Vec<Self> {
        args.iter()
            .enumerate()
            .map(|(idx, arg)| {
                let (value, param_type) = match arg {
                    Value::Null => (None, "STRING"),
                    Value::Bool(b) => (Some(b.to_string()), "BOOLEAN"),
                    Value::Number(n) if n.is_i64() || n.is_u64() => {
                        (Some(n.to_string()), "BIGINT")
                    }
                    Value::Number(n) => (Some(n.to_string()), "DOUBLE"),
                    Value::String(s) => (Some(s.clone()), "STRING"),
                    other => (Some(other.to_string()), "STRING"),
                };
                StatementParameter {
                    name: format!("p{}", idx + 1),
                    value,
                    param_type,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StatementResponse {
    pub statement_id: String,
    pub status: StatementStatus,
    #[serde(default)]
    pub manifest: Option<ResultManifest>,
    #[serde(default)]
    pub result: Option<ResultChunk>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StatementStatus {
    pub state: StatementState,
    #[serde(default)]
    pub error: Option<ServiceError>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum StatementState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Closed,
}

impl StatementState {
    pub(crate) fn is_terminal(&self) -> bool {
        !matches!(self, StatementState::Pending | StatementState::Running)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ServiceError {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResultManifest {
    pub schema: ResultSchema,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResultSchema {
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ColumnInfo {
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub position: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ResultChunk {
    #[serde(default)]
    pub data_array: Vec<Vec<Option<String>>>,
    #[serde(default)]
    pub next_chunk_internal_link: Option<String>,
}

impl ResultManifest {
    /// Columns ordered by position
    pub(crate) fn columns(&self) -> Vec<ColumnMetadata> {
        let mut columns = self.schema.columns.clone();
        columns.sort_by_key(|c| c.position);
        columns
            .into_iter()
            .map(|c| ColumnMetadata::new(c.name, c.type_name))
            .collect()
    }
}

/// Convert a JSON_ARRAY cell (always a string or null) by its declared type
///
/// Cells that do not parse under their declared type are kept as strings.
pub(crate) fn convert_cell(column: &ColumnMetadata, cell: Option<String>) -> Value {
    let Some(raw) = cell else {
        return Value::Null;
    };

    match column.native_type.to_ascii_uppercase().as_str() {
        "BYTE" | "SHORT" | "INT" | "LONG" => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::String(raw)),
        "FLOAT" | "DOUBLE" | "DECIMAL" => {
            parse_numeric(&column.name, &raw).unwrap_or(Value::String(raw))
        }
        "BOOLEAN" => match raw.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw),
        },
        _ => Value::String(raw),
    }
}
