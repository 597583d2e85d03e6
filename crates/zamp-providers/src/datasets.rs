//! Dataset catalog access
//!
//! Catalog rows live in a lakehouse table with one column per backend for the
//! physical table name, schema and statistics
//! (`pinot_table_name`, `databricks_schema`, `postgres_statistics`, ...).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use zamp_query::{BackendKind, DataError, DataRow, ProviderRegistry, Result};

/// Catalog record for one logical dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub dataset_id: String,
    pub merchant_id: String,
    /// Physical table name per backend
    pub table_names: HashMap<BackendKind, String>,
    /// Raw schema JSON per backend
    pub schemas: HashMap<BackendKind, String>,
    /// Raw statistics JSON per backend
    pub statistics: HashMap<BackendKind, String>,
    pub dataset_config: Option<Value>,
}

impl Dataset {
    pub fn new(merchant_id: impl Into<String>, dataset_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            merchant_id: merchant_id.into(),
            ..Default::default()
        }
    }

    pub fn with_table(mut self, kind: BackendKind, table_name: impl Into<String>) -> Self {
        self.table_names.insert(kind, table_name.into());
        self
    }

    pub fn with_schema(mut self, kind: BackendKind, schema: impl Into<String>) -> Self {
        self.schemas.insert(kind, schema.into());
        self
    }

    pub fn with_statistics(mut self, kind: BackendKind, statistics: impl Into<String>) -> Self {
        self.statistics.insert(kind, statistics.into());
        self
    }

    /// Physical table on a backend; empty names count as absent
    pub fn table_name(&self, kind: BackendKind) -> Option<&str> {
        self.table_names
            .get(&kind)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }
}

/// Immediate upstream node of a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetParent {
    pub parent_id: String,
    pub parent_type: String,
}

/// Read-only access to the dataset catalog
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Fetch a non-deleted dataset; `DatasetNotFound` when there is no row
    async fn get_dataset(&self, merchant_id: &str, dataset_id: &str) -> Result<Dataset>;

    async fn get_dataset_parents(
        &self,
        merchant_id: &str,
        dataset_id: &str,
    ) -> Result<Vec<DatasetParent>>;
}

/// Catalog store that queries the metadata lakehouse instance through the registry
pub struct LakehouseDatasetStore {
    registry: Arc<ProviderRegistry>,
    instance_id: String,
    datasets_table: String,
    mappings_table: String,
}

impl LakehouseDatasetStore {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        instance_id: impl Into<String>,
        datasets_table: impl Into<String>,
        mappings_table: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            instance_id: instance_id.into(),
            datasets_table: datasets_table.into(),
            mappings_table: mappings_table.into(),
        }
    }

    fn dataset_sql(&self) -> String {
        let mut columns = vec!["id".to_string(), "merchant_id".to_string()];
        for kind in BackendKind::ALL {
            let product = kind.product_name();
            columns.push(format!("{}_table_name", product));
            columns.push(format!("{}_schema", product));
            columns.push(format!("{}_statistics", product));
        }
        columns.push("dataset_config".to_string());

        format!(
            "SELECT {} FROM {} WHERE merchant_id = :p1 AND id = :p2 \
             AND coalesce(is_deleted, false) = false LIMIT 1",
            columns.join(", "),
            self.datasets_table
        )
    }

    fn parents_sql(&self) -> String {
        format!(
            "SELECT parent_id, parent_type FROM {} WHERE merchant_id = :p1 AND child_id = :p2 \
             AND coalesce(is_deleted, false) = false ORDER BY parent_id",
            self.mappings_table
        )
    }

    async fn run(&self, table: &str, sql: &str, args: &[Value]) -> Result<Vec<DataRow>> {
        let source = self
            .registry
            .get_source(BackendKind::LakehouseSql, &self.instance_id)
            .await?;
        Ok(source.query(table, sql, args).await?.rows)
    }
}

fn string_field(row: &DataRow, column: &str) -> Option<String> {
    match row.get(column) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(Value::String(_)) => None,
        Some(other) => Some(other.to_string()),
    }
}

/// Build a dataset from a catalog row
pub(crate) fn dataset_from_row(row: &DataRow) -> Result<Dataset> {
    let mut dataset = Dataset::new(
        string_field(row, "merchant_id").unwrap_or_default(),
        string_field(row, "id").unwrap_or_default(),
    );

    for kind in BackendKind::ALL {
        let product = kind.product_name();
        if let Some(table) = string_field(row, &format!("{}_table_name", product)) {
            dataset.table_names.insert(kind, table);
        }
        if let Some(schema) = string_field(row, &format!("{}_schema", product)) {
            dataset.schemas.insert(kind, schema);
        }
        if let Some(stats) = string_field(row, &format!("{}_statistics", product)) {
            dataset.statistics.insert(kind, stats);
        }
    }

    dataset.dataset_config = match row.get("dataset_config") {
        Some(Value::String(raw)) if !raw.is_empty() => Some(
            serde_json::from_str(raw)
                .map_err(|e| DataError::json_decode("dataset_config", e))?,
        ),
        Some(Value::Null) | Some(Value::String(_)) | None => None,
        Some(other) => Some(other.clone()),
    };

    Ok(dataset)
}

#[async_trait]
impl DatasetStore for LakehouseDatasetStore {
    async fn get_dataset(&self, merchant_id: &str, dataset_id: &str) -> Result<Dataset> {
        debug!("Looking up dataset {} for merchant {}", dataset_id, merchant_id);

        let rows = self
            .run(
                &self.datasets_table,
                &self.dataset_sql(),
                &[json!(merchant_id), json!(dataset_id)],
            )
            .await?;

        let row = rows.first().ok_or_else(|| DataError::DatasetNotFound {
            merchant_id: merchant_id.to_string(),
            dataset_id: dataset_id.to_string(),
        })?;

        dataset_from_row(row)
    }

    async fn get_dataset_parents(
        &self,
        merchant_id: &str,
        dataset_id: &str,
    ) -> Result<Vec<DatasetParent>> {
        let rows = self
            .run(
                &self.mappings_table,
                &self.parents_sql(),
                &[json!(merchant_id), json!(dataset_id)],
            )
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(DatasetParent {
                    parent_id: string_field(row, "parent_id")?,
                    parent_type: string_field(row, "parent_type").unwrap_or_default(),
                })
            })
            .collect())
    }
}
