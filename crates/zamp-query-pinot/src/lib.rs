//! Apache Pinot driver for zamp-query
//!
//! Talks to a Pinot broker over HTTP (`POST /query/sql`) with bearer-token
//! auth and a fixed client-side timeout. The multi-stage query engine is
//! always enabled.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use zamp_query::result::from_broker_response;
use zamp_query::{
    quote_single, BackendKind, BrokerResponse, DataError, DataSource, DataSourceFactory,
    ErrorReporter, InstanceConfig, QueryResult, Result, TracingErrorReporter,
};

const KIND: BackendKind = BackendKind::RealtimeColumnar;
const MULTISTAGE_QUERY_OPTION: &str = "useMultistageEngine=true";

fn default_timeout_secs() -> u64 {
    30
}

/// Connection parameters for a Pinot broker instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinotConfig {
    /// Broker base URL, e.g. `https://broker.pinot.example.com`
    pub broker_url: String,
    /// Bearer token sent as `Authorization: Bearer <token>`
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl PinotConfig {
    pub fn from_instance(config: &InstanceConfig) -> Result<Self> {
        let parsed: PinotConfig = serde_json::from_value(config.connection_params.clone())
            .map_err(|e| {
                DataError::invalid_configuration(
                    KIND,
                    format!("Failed to parse Pinot configuration: {}", e),
                )
            })?;

        if parsed.broker_url.trim().is_empty() {
            return Err(DataError::invalid_configuration(
                KIND,
                "broker_url must not be empty",
            ));
        }

        Ok(parsed)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrokerRequest<'a> {
    sql: &'a str,
    query_options: &'a str,
}

/// Pinot data source implementation
pub struct PinotSource {
    instance_id: String,
    client: Client,
    broker_url: String,
    token: Option<String>,
    reporter: Arc<dyn ErrorReporter>,
}

impl PinotSource {
    /// Create a broker client
    pub fn new(
        instance_id: impl Into<String>,
        config: PinotConfig,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DataError::ConnectionFailed {
                kind: KIND,
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            instance_id: instance_id.into(),
            client,
            broker_url: config.broker_url.trim_end_matches('/').to_string(),
            token: config.token,
            reporter,
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Send SQL to the broker and decode the raw response
    async fn execute(&self, sql: &str) -> Result<BrokerResponse> {
        let url = format!("{}/query/sql", self.broker_url);
        let body = BrokerRequest {
            sql,
            query_options: MULTISTAGE_QUERY_OPTION,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DataError::backend(KIND, format!("Broker request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DataError::backend(KIND, format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(DataError::backend(
                KIND,
                format!("Broker returned status {}: {}", status, text),
            ));
        }

        serde_json::from_str(&text).map_err(|e| DataError::json_decode("Pinot broker response", e))
    }
}

#[async_trait]
impl DataSource for PinotSource {
    fn backend_kind(&self) -> BackendKind {
        KIND
    }

    fn quote_table_name(&self, table_name: &str) -> String {
        quote_single(table_name)
    }

    async fn query(
        &self,
        table: &str,
        query: &str,
        args: &[serde_json::Value],
    ) -> Result<QueryResult> {
        if !args.is_empty() {
            warn!(
                "Pinot does not support bind parameters, ignoring {} args",
                args.len()
            );
        }

        debug!("Executing Pinot query: {}", query);
        let start = Instant::now();

        let outcome = self
            .execute(query)
            .await
            .and_then(|response| from_broker_response(&response));

        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                info!(
                    "Pinot query on {} returned {} rows in {}ms",
                    table,
                    result.row_count(),
                    elapsed_ms
                );
                Ok(result)
            }
            Err(e) => {
                info!("Pinot query on {} failed after {}ms", table, elapsed_ms);
                self.reporter.capture_exception(
                    &e,
                    "pinot query",
                    &[("instance_id", self.instance_id.as_str()), ("table", table)],
                );
                Err(e)
            }
        }
    }

    async fn close(&self) -> Result<()> {
        debug!("Closing Pinot client for {}", self.instance_id);
        Ok(())
    }
}

/// Builds [`PinotSource`] adapters from instance configuration
pub struct PinotFactory {
    reporter: Arc<dyn ErrorReporter>,
}

impl PinotFactory {
    pub fn new(reporter: Arc<dyn ErrorReporter>) -> Self {
        Self { reporter }
    }
}

impl Default for PinotFactory {
    fn default() -> Self {
        Self::new(Arc::new(TracingErrorReporter))
    }
}

#[async_trait]
impl DataSourceFactory for PinotFactory {
    fn backend_kind(&self) -> BackendKind {
        KIND
    }

    fn validate(&self, config: &InstanceConfig) -> Result<()> {
        PinotConfig::from_instance(config).map(|_| ())
    }

    async fn create_source(&self, config: &InstanceConfig) -> Result<Arc<dyn DataSource>> {
        let pinot_config = PinotConfig::from_instance(config)?;
        let source = PinotSource::new(
            config.instance_id.clone(),
            pinot_config,
            self.reporter.clone(),
        )?;
        Ok(Arc::new(source))
    }
}
