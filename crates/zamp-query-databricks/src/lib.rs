//! Databricks SQL driver for zamp-query
//!
//! Executes statements on a SQL warehouse through the Statement Execution
//! API with bearer-token auth. Results are fetched inline as JSON arrays,
//! following result chunks until exhausted, and converted into rows by the
//! declared column types. The same workspace credentials back a Jobs API
//! client ([`DatabricksJobs`]) for batch runs.

mod client;
mod jobs;
mod statement;

pub use jobs::{DatabricksJobs, RunState, RunStatus};

use async_trait::async_trait;
use client::ApiClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use statement::{
    convert_cell, ExecuteStatementRequest, StatementParameter, StatementResponse, StatementState,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use zamp_query::result::from_rows;
use zamp_query::{
    quote_segments, BackendKind, DataError, DataSource, DataSourceFactory, InstanceConfig,
    QueryResult, Result,
};

const KIND: BackendKind = BackendKind::LakehouseSql;
const STATEMENTS_PATH: &str = "/api/2.0/sql/statements";
const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn default_query_timeout_secs() -> u64 {
    120
}

/// Connection parameters for a Databricks SQL warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabricksConfig {
    /// Workspace host, with or without scheme
    pub host: String,
    /// Personal access or service principal token
    pub token: String,
    pub warehouse_id: String,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    /// Budget for one statement, including polling and chunk fetches
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl DatabricksConfig {
    pub fn from_instance(config: &InstanceConfig) -> Result<Self> {
        let parsed: DatabricksConfig = serde_json::from_value(config.connection_params.clone())
            .map_err(|e| {
                DataError::invalid_configuration(
                    KIND,
                    format!("Failed to parse Databricks configuration: {}", e),
                )
            })?;

        for (field, value) in [
            ("host", &parsed.host),
            ("token", &parsed.token),
            ("warehouse_id", &parsed.warehouse_id),
        ] {
            if value.trim().is_empty() {
                return Err(DataError::invalid_configuration(
                    KIND,
                    format!("{} must not be empty", field),
                ));
            }
        }

        Ok(parsed)
    }
}

/// Databricks SQL data source implementation
pub struct DatabricksSource {
    instance_id: String,
    api: ApiClient,
    jobs: DatabricksJobs,
    warehouse_id: String,
    catalog: Option<String>,
    schema: Option<String>,
    query_timeout: Duration,
}

impl DatabricksSource {
    /// Create a workspace client; no request is sent until the first query
    pub fn connect(instance_id: impl Into<String>, config: DatabricksConfig) -> Result<Self> {
        let query_timeout = Duration::from_secs(config.query_timeout_secs);
        let api = ApiClient::new(&config.host, &config.token, query_timeout)?;

        debug!(
            "Configured Databricks warehouse {} on {}",
            config.warehouse_id, config.host
        );

        Ok(Self {
            instance_id: instance_id.into(),
            jobs: DatabricksJobs::new(api.clone()),
            api,
            warehouse_id: config.warehouse_id,
            catalog: config.catalog,
            schema: config.schema,
            query_timeout,
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Jobs API client sharing this workspace's credentials
    pub fn jobs(&self) -> &DatabricksJobs {
        &self.jobs
    }

    async fn execute_statement(&self, sql: &str, args: &[Value]) -> Result<QueryResult> {
        let deadline = Instant::now() + self.query_timeout;

        let request = ExecuteStatementRequest {
            statement: sql,
            warehouse_id: &self.warehouse_id,
            catalog: self.catalog.as_deref(),
            schema: self.schema.as_deref(),
            wait_timeout: format!("{}s", self.query_timeout.as_secs().clamp(5, 50)),
            on_wait_timeout: "CONTINUE",
            disposition: "INLINE",
            format: "JSON_ARRAY",
            parameters: StatementParameter::from_args(args),
        };

        let mut response: StatementResponse = self.api.post(STATEMENTS_PATH, &request).await?;

        while !response.status.state.is_terminal() {
            if Instant::now() >= deadline {
                self.cancel_statement(&response.statement_id).await;
                return Err(DataError::backend(
                    KIND,
                    format!(
                        "Statement {} did not finish within {}s",
                        response.statement_id,
                        self.query_timeout.as_secs()
                    ),
                ));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
            response = self
                .api
                .get(&format!("{}/{}", STATEMENTS_PATH, response.statement_id))
                .await?;
        }

        if response.status.state != StatementState::Succeeded {
            let detail = response
                .status
                .error
                .map(|e| match e.error_code {
                    Some(code) => format!("{}: {}", code, e.message),
                    None => e.message,
                })
                .unwrap_or_else(|| format!("statement ended in state {:?}", response.status.state));
            return Err(DataError::backend(KIND, detail));
        }

        let manifest = response.manifest.ok_or_else(|| {
            DataError::backend(KIND, "Succeeded statement returned no result manifest")
        })?;
        let columns = manifest.columns();

        let mut rows = Vec::new();
        let mut chunk = response.result.unwrap_or_default();
        loop {
            for cells in chunk.data_array {
                rows.push(
                    columns
                        .iter()
                        .zip(cells)
                        .map(|(column, cell)| convert_cell(column, cell))
                        .collect(),
                );
            }

            let Some(link) = chunk.next_chunk_internal_link else {
                break;
            };
            if Instant::now() >= deadline {
                return Err(DataError::backend(
                    KIND,
                    format!(
                        "Results of statement {} were not fetched within {}s",
                        response.statement_id,
                        self.query_timeout.as_secs()
                    ),
                ));
            }
            chunk = self.api.get(&link).await?;
        }

        Ok(from_rows(columns, rows))
    }

    async fn cancel_statement(&self, statement_id: &str) {
        let path = format!("{}/{}/cancel", STATEMENTS_PATH, statement_id);
        if let Err(e) = self.api.post::<_, Value>(&path, &serde_json::json!({})).await {
            warn!("Failed to cancel statement {}: {}", statement_id, e);
        }
    }
}

#[async_trait]
impl DataSource for DatabricksSource {
    fn backend_kind(&self) -> BackendKind {
        KIND
    }

    fn quote_table_name(&self, table_name: &str) -> String {
        quote_segments(table_name)
    }

    async fn query(&self, table: &str, query: &str, args: &[Value]) -> Result<QueryResult> {
        debug!("Executing Databricks query: {}", query);
        let start = Instant::now();

        let outcome = self.execute_statement(query, args).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            Ok(result) => info!(
                "Databricks query on {} returned {} rows in {}ms",
                table,
                result.row_count(),
                elapsed_ms
            ),
            Err(e) => warn!(
                "Databricks query on {} failed after {}ms: {}",
                table, elapsed_ms, e
            ),
        }

        outcome
    }

    async fn close(&self) -> Result<()> {
        debug!("Closing Databricks client for {}", self.instance_id);
        Ok(())
    }
}

/// Builds [`DatabricksSource`] adapters from instance configuration
#[derive(Debug, Default)]
pub struct DatabricksFactory;

#[async_trait]
impl DataSourceFactory for DatabricksFactory {
    fn backend_kind(&self) -> BackendKind {
        KIND
    }

    fn validate(&self, config: &InstanceConfig) -> Result<()> {
        DatabricksConfig::from_instance(config).map(|_| ())
    }

    async fn create_source(&self, config: &InstanceConfig) -> Result<Arc<dyn DataSource>> {
        let databricks_config = DatabricksConfig::from_instance(config)?;
        let source = DatabricksSource::connect(config.instance_id.clone(), databricks_config)?;
        Ok(Arc::new(source))
    }
}
