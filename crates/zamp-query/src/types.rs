use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Analytical backends a query can be routed to
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Columnar real-time store (Apache Pinot broker)
    RealtimeColumnar,
    /// Lakehouse SQL warehouse (Databricks SQL)
    LakehouseSql,
    /// Relational database (PostgreSQL)
    Relational,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [
        BackendKind::RealtimeColumnar,
        BackendKind::LakehouseSql,
        BackendKind::Relational,
    ];

    /// Product name, used as the column prefix in the dataset catalog
    /// (`pinot_table_name`, `databricks_schema`, ...)
    pub fn product_name(&self) -> &'static str {
        match self {
            BackendKind::RealtimeColumnar => "pinot",
            BackendKind::LakehouseSql => "databricks",
            BackendKind::Relational => "postgres",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::RealtimeColumnar => write!(f, "realtime_columnar"),
            BackendKind::LakehouseSql => write!(f, "lakehouse_sql"),
            BackendKind::Relational => write!(f, "relational"),
        }
    }
}

/// Registry key: one live adapter per (kind, instance)
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ProviderKey {
    pub kind: BackendKind,
    pub instance_id: String,
}

impl ProviderKey {
    pub fn new(kind: BackendKind, instance_id: impl Into<String>) -> Self {
        Self {
            kind,
            instance_id: instance_id.into(),
        }
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.instance_id)
    }
}

/// One tenant-routable backend instance, loaded at boot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub instance_id: String,
    pub kind: BackendKind,
    /// Backend-specific connection parameters, interpreted by the adapter's factory
    #[serde(default)]
    pub connection_params: serde_json::Value,
}

impl InstanceConfig {
    pub fn new(
        instance_id: impl Into<String>,
        kind: BackendKind,
        connection_params: serde_json::Value,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            kind,
            connection_params,
        }
    }

    pub fn key(&self) -> ProviderKey {
        ProviderKey::new(self.kind, self.instance_id.clone())
    }
}

/// Column name and the type name reported by the backend
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub native_type: String,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, native_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native_type: native_type.into(),
        }
    }

    /// Whether the backend declared this column as an array type
    /// (`ARRAY`, `ARRAY<STRING>`, `INT_ARRAY`, `text[]`)
    pub fn is_array(&self) -> bool {
        let t = self.native_type.trim().to_ascii_uppercase();
        t == "ARRAY" || t.starts_with("ARRAY<") || t.ends_with("_ARRAY") || t.ends_with("[]")
    }
}

/// A row of data as column name -> value
pub type DataRow = HashMap<String, serde_json::Value>;

/// Backend-agnostic tabular result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Rows in backend order
    pub rows: Vec<DataRow>,
    /// Columns in declaration order
    pub columns: Vec<ColumnMetadata>,
}

impl QueryResult {
    pub fn new(rows: Vec<DataRow>, columns: Vec<ColumnMetadata>) -> Self {
        Self { rows, columns }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}
