//! Composite dataset metadata and lineage views

use crate::datasets::{Dataset, DatasetParent};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use zamp_query::{BackendKind, DataError, Result};

/// One column of a dataset schema blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
}

/// Per-column statistics (`min`, `max`, `null_count`, ...)
pub type ColumnStatistics = Map<String, Value>;

/// Schema and statistics merged across every backend holding the dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetMetadata {
    pub dataset_id: String,
    pub table_names: HashMap<BackendKind, String>,
    /// Backend whose schema is used as the column list
    pub schema_source: Option<BackendKind>,
    pub columns: Vec<ColumnSchema>,
    pub statistics: BTreeMap<String, ColumnStatistics>,
    pub dataset_config: Option<Value>,
}

impl DatasetMetadata {
    /// Merge the per-backend blobs of a dataset
    ///
    /// The lakehouse schema is canonical, otherwise the first backend that has
    /// one. Statistics are merged per column; lakehouse values win on
    /// conflicting keys.
    pub fn merge(dataset: &Dataset) -> Result<Self> {
        let mut schemas = HashMap::new();
        for (kind, raw) in &dataset.schemas {
            let columns: Vec<ColumnSchema> = serde_json::from_str(raw).map_err(|e| {
                DataError::json_decode(format!("{} schema of {}", kind, dataset.dataset_id), e)
            })?;
            schemas.insert(*kind, columns);
        }

        let schema_source = if schemas.contains_key(&BackendKind::LakehouseSql) {
            Some(BackendKind::LakehouseSql)
        } else {
            BackendKind::ALL
                .into_iter()
                .find(|kind| schemas.contains_key(kind))
        };
        let columns = schema_source
            .and_then(|kind| schemas.remove(&kind))
            .unwrap_or_default();

        // Lakehouse is applied last so its values overwrite
        let order = BackendKind::ALL
            .into_iter()
            .filter(|kind| *kind != BackendKind::LakehouseSql)
            .chain(std::iter::once(BackendKind::LakehouseSql));

        let mut statistics: BTreeMap<String, ColumnStatistics> = BTreeMap::new();
        for kind in order {
            let Some(raw) = dataset.statistics.get(&kind) else {
                continue;
            };
            let parsed: HashMap<String, ColumnStatistics> =
                serde_json::from_str(raw).map_err(|e| {
                    DataError::json_decode(
                        format!("{} statistics of {}", kind, dataset.dataset_id),
                        e,
                    )
                })?;

            for (column, stats) in parsed {
                statistics.entry(column).or_default().extend(stats);
            }
        }

        Ok(Self {
            dataset_id: dataset.dataset_id.clone(),
            table_names: dataset.table_names.clone(),
            schema_source,
            columns,
            statistics,
            dataset_config: dataset.dataset_config.clone(),
        })
    }
}

/// Node in the dataset lineage graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetNode {
    pub id: String,
    pub node_type: String,
}

/// Immediate upstream nodes of a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetParents {
    pub dataset_id: String,
    pub parents: Vec<DatasetNode>,
}

impl DatasetParents {
    pub fn new(dataset_id: impl Into<String>, parents: Vec<DatasetParent>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            parents: parents
                .into_iter()
                .map(|p| DatasetNode {
                    id: p.parent_id,
                    node_type: p.parent_type,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use zamp_query::ErrorKind;

    #[test]
    fn test_lakehouse_schema_is_canonical() {
        let dataset = Dataset::new("m1", "ds1")
            .with_schema(
                BackendKind::RealtimeColumnar,
                r#"[{"name":"id","type":"STRING"}]"#,
            )
            .with_schema(
                BackendKind::LakehouseSql,
                r#"[{"name":"id","type":"string","nullable":false},{"name":"amount","type":"double"}]"#,
            );

        let metadata = DatasetMetadata::merge(&dataset).unwrap();
        assert_eq!(metadata.schema_source, Some(BackendKind::LakehouseSql));
        assert_eq!(metadata.columns.len(), 2);
        assert_eq!(metadata.columns[0].nullable, Some(false));
        assert_eq!(metadata.columns[1].data_type, "double");
    }

    #[test]
    fn test_schema_falls_back_to_first_backend() {
        let dataset = Dataset::new("m1", "ds1")
            .with_schema(BackendKind::Relational, r#"[{"name":"b","type":"text"}]"#)
            .with_schema(
                BackendKind::RealtimeColumnar,
                r#"[{"name":"a","type":"STRING"}]"#,
            );

        let metadata = DatasetMetadata::merge(&dataset).unwrap();
        assert_eq!(metadata.schema_source, Some(BackendKind::RealtimeColumnar));
        assert_eq!(metadata.columns[0].name, "a");
    }

    #[test]
    fn test_statistics_merge() {
        let dataset = Dataset::new("m1", "ds1")
            .with_statistics(
                BackendKind::LakehouseSql,
                r#"{"amount":{"min":0,"max":100}}"#,
            )
            .with_statistics(
                BackendKind::RealtimeColumnar,
                r#"{"amount":{"max":90,"cardinality":12},"id":{"null_count":0}}"#,
            );

        let metadata = DatasetMetadata::merge(&dataset).unwrap();
        let amount = &metadata.statistics["amount"];
        assert_eq!(amount["max"], json!(100));
        assert_eq!(amount["cardinality"], json!(12));
        assert_eq!(amount["min"], json!(0));
        assert_eq!(metadata.statistics["id"]["null_count"], json!(0));
        assert!(metadata.columns.is_empty());
        assert_eq!(metadata.schema_source, None);
    }

    #[test]
    fn test_malformed_blob() {
        let dataset = Dataset::new("m1", "ds1").with_schema(BackendKind::LakehouseSql, "{oops");
        let err = DatasetMetadata::merge(&dataset).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::JsonDecodeFailed);
    }

    #[test]
    fn test_parents() {
        let parents = DatasetParents::new(
            "ds1",
            vec![DatasetParent {
                parent_id: "ds0".to_string(),
                parent_type: "dataset".to_string(),
            }],
        );
        assert_eq!(parents.parents[0].id, "ds0");
        assert_eq!(parents.parents[0].node_type, "dataset");
    }
}
