//! Engine configuration loaded from YAML (or JSON) at boot

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zamp_query::{BackendKind, InstanceConfig, ProviderKey};

pub const DEFAULT_DATASET_PARAM_PREFIX: &str = "zamp_table_name";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn default_dataset_param_prefix() -> String {
    DEFAULT_DATASET_PARAM_PREFIX.to_string()
}

fn default_datasets_table() -> String {
    "datasets".to_string()
}

fn default_mappings_table() -> String {
    "dataset_mappings".to_string()
}

fn default_translator_timeout_secs() -> u64 {
    10
}

/// Top-level configuration of the query engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEngineConfig {
    /// Every backend instance the registry may serve
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Dialect translation service; absent means queries pass through untranslated
    #[serde(default)]
    pub translator: Option<TranslatorConfig>,

    /// Parameter keys starting with this prefix name a dataset
    #[serde(default = "default_dataset_param_prefix")]
    pub dataset_param_prefix: String,
}

/// Tenant to instance routing table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Instance used for a backend kind when a merchant has no override
    #[serde(default)]
    pub defaults: HashMap<BackendKind, String>,

    /// Per-merchant instance overrides
    #[serde(default)]
    pub merchant_overrides: HashMap<String, HashMap<BackendKind, String>>,
}

/// Where the dataset catalog lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Lakehouse instance holding the catalog; defaults to the lakehouse
    /// routing default
    #[serde(default)]
    pub instance_id: Option<String>,

    #[serde(default = "default_datasets_table")]
    pub datasets_table: String,

    #[serde(default = "default_mappings_table")]
    pub mappings_table: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            instance_id: None,
            datasets_table: default_datasets_table(),
            mappings_table: default_mappings_table(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    pub url: String,
    #[serde(default = "default_translator_timeout_secs")]
    pub timeout_secs: u64,
}

impl QueryEngineConfig {
    /// Load configuration from a YAML or JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parse configuration from a YAML (or JSON) document
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: QueryEngineConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Lakehouse instance that serves the dataset catalog
    pub fn metadata_instance(&self) -> Option<&str> {
        self.metadata
            .instance_id
            .as_deref()
            .or_else(|| {
                self.routing
                    .defaults
                    .get(&BackendKind::LakehouseSql)
                    .map(String::as_str)
            })
    }

    /// Check that routing only points at declared instances of the right kind
    pub fn validate(&self) -> Result<(), ConfigError> {
        let declared: Vec<ProviderKey> = self.instances.iter().map(|i| i.key()).collect();
        let is_declared =
            |kind: BackendKind, id: &str| declared.contains(&ProviderKey::new(kind, id));

        for (kind, instance_id) in &self.routing.defaults {
            if !is_declared(*kind, instance_id) {
                return Err(ConfigError::Invalid(format!(
                    "routing default for {} points at undeclared instance '{}'",
                    kind, instance_id
                )));
            }
        }

        for (merchant_id, overrides) in &self.routing.merchant_overrides {
            for (kind, instance_id) in overrides {
                if !is_declared(*kind, instance_id) {
                    return Err(ConfigError::Invalid(format!(
                        "override for merchant '{}' points at undeclared {} instance '{}'",
                        merchant_id, kind, instance_id
                    )));
                }
            }
        }

        if let Some(instance_id) = &self.metadata.instance_id {
            if !is_declared(BackendKind::LakehouseSql, instance_id) {
                return Err(ConfigError::Invalid(format!(
                    "metadata instance '{}' is not a declared lakehouse instance",
                    instance_id
                )));
            }
        }

        if self.dataset_param_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "dataset_param_prefix must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
instances:
  - instance_id: pinot-default
    kind: realtime_columnar
    connection_params:
      broker_url: http://pinot-broker:8099
  - instance_id: dbx-default
    kind: lakehouse_sql
    connection_params:
      host: dbc-1.cloud.databricks.com
      token: dapi-secret
      warehouse_id: wh-1
  - instance_id: dbx-eu
    kind: lakehouse_sql
    connection_params:
      host: dbc-2.cloud.databricks.com
      token: dapi-secret
      warehouse_id: wh-2
routing:
  defaults:
    realtime_columnar: pinot-default
    lakehouse_sql: dbx-default
  merchant_overrides:
    m-eu:
      lakehouse_sql: dbx-eu
translator:
  url: http://rosetta:8080
"#;

    #[test]
    fn test_parse_sample() {
        let config = QueryEngineConfig::from_yaml_str(SAMPLE).unwrap();

        assert_eq!(config.instances.len(), 3);
        assert_eq!(config.dataset_param_prefix, "zamp_table_name");
        assert_eq!(config.metadata.datasets_table, "datasets");
        assert_eq!(config.metadata_instance(), Some("dbx-default"));
        assert_eq!(
            config.routing.merchant_overrides["m-eu"][&BackendKind::LakehouseSql],
            "dbx-eu"
        );

        let translator = config.translator.unwrap();
        assert_eq!(translator.url, "http://rosetta:8080");
        assert_eq!(translator.timeout_secs, 10);
    }

    #[test]
    fn test_routing_to_undeclared_instance() {
        let yaml = r#"
instances: []
routing:
  defaults:
    lakehouse_sql: missing
"#;
        let err = QueryEngineConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_routing_kind_must_match() {
        let yaml = r#"
instances:
  - instance_id: pg-1
    kind: relational
    connection_params: {dsn: "postgres://localhost/db"}
routing:
  defaults:
    lakehouse_sql: pg-1
"#;
        assert!(QueryEngineConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_from_file_accepts_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"instances": [], "dataset_param_prefix": "ds_", "metadata": {{"mappings_table": "lineage"}}}}"#
        )
        .unwrap();

        let config = QueryEngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.dataset_param_prefix, "ds_");
        assert_eq!(config.metadata.mappings_table, "lineage");
        assert_eq!(config.metadata_instance(), None);
        assert!(config.translator.is_none());
    }

    #[test]
    fn test_from_file_missing() {
        let err = QueryEngineConfig::from_file("/nonexistent/zamp.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
