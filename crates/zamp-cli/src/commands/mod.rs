pub mod dataset;
pub mod query;

pub use dataset::{DatasetMetadataCommand, DatasetParentsCommand};
pub use query::QueryCommand;

use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};
use zamp_providers::{bootstrap, QueryContext, QueryEngineConfig, QueryService};

/// Options shared by every subcommand
#[derive(Args)]
pub struct EngineArgs {
    /// Engine configuration file (YAML or JSON)
    #[arg(long, env = "ZAMP_CONFIG", default_value = "zamp.yaml")]
    pub config: PathBuf,

    /// Merchant the request runs for
    #[arg(long)]
    pub merchant_id: String,

    /// Trace id attached to backend query logs; generated when omitted
    #[arg(long)]
    pub trace_id: Option<String>,

    /// Overall deadline in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl EngineArgs {
    pub fn context(&self) -> QueryContext {
        let mut ctx = QueryContext::new(&self.merchant_id);
        if let Some(trace_id) = &self.trace_id {
            ctx = ctx.with_trace_id(trace_id);
        }
        if let Some(secs) = self.timeout_secs {
            ctx = ctx.with_timeout(Duration::from_secs(secs));
        }
        ctx
    }

    pub async fn service(&self) -> anyhow::Result<QueryService> {
        debug!("Loading configuration from {}", self.config.display());
        let config = QueryEngineConfig::from_file(&self.config)?;

        let (service, report) = bootstrap(&config).await?;
        if !report.is_complete() {
            warn!(
                "{} provider(s) failed at boot and will be retried on use",
                report.failed.len()
            );
        }
        Ok(service)
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
