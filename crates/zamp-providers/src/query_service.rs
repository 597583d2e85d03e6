use crate::datasets::DatasetStore;
use crate::metadata::{DatasetMetadata, DatasetParents};
use crate::routing::InstanceRouter;
use crate::template::fill_template;
use crate::translator::DialectTranslator;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use zamp_query::{BackendKind, DataError, ProviderRegistry, QueryResult, Result};

/// Per-request context: tenant, trace id and an optional deadline
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub merchant_id: String,
    pub trace_id: String,
    pub deadline: Option<Instant>,
}

impl QueryContext {
    /// New context with a generated trace id and no deadline
    pub fn new(merchant_id: impl Into<String>) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
            deadline: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        let trace_id = trace_id.into();
        if !trace_id.is_empty() {
            self.trace_id = trace_id;
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }
}

/// Tenant-facing entry point for logical queries against logical datasets
pub struct QueryService {
    registry: Arc<ProviderRegistry>,
    router: InstanceRouter,
    datasets: Arc<dyn DatasetStore>,
    translator: Arc<dyn DialectTranslator>,
    dataset_param_prefix: String,
}

/// Parameters after dataset references were replaced by quoted table names
struct ResolvedParams {
    params: HashMap<String, String>,
    table_names: Vec<String>,
    has_dataset_params: bool,
}

impl QueryService {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        router: InstanceRouter,
        datasets: Arc<dyn DatasetStore>,
        translator: Arc<dyn DialectTranslator>,
    ) -> Self {
        Self {
            registry,
            router,
            datasets,
            translator,
            dataset_param_prefix: crate::config::DEFAULT_DATASET_PARAM_PREFIX.to_string(),
        }
    }

    pub fn with_dataset_param_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.dataset_param_prefix = prefix.into();
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Execute against the lakehouse backend
    pub async fn query(
        &self,
        ctx: &QueryContext,
        query_template: &str,
        params: &HashMap<String, String>,
    ) -> Result<QueryResult> {
        with_deadline(
            ctx,
            self.execute(ctx, BackendKind::LakehouseSql, query_template, params),
        )
        .await
    }

    /// Execute against the real-time backend, re-running the whole
    /// orchestration against the lakehouse once on any failure
    pub async fn query_real_time(
        &self,
        ctx: &QueryContext,
        query_template: &str,
        params: &HashMap<String, String>,
    ) -> Result<QueryResult> {
        with_deadline(ctx, async {
            match self
                .execute(ctx, BackendKind::RealtimeColumnar, query_template, params)
                .await
            {
                Ok(result) => Ok(result),
                Err(e) => {
                    warn!(
                        merchant_id = %ctx.merchant_id,
                        trace_id = %ctx.trace_id,
                        "Real-time query failed, falling back to lakehouse: {}",
                        e
                    );
                    self.execute(ctx, BackendKind::LakehouseSql, query_template, params)
                        .await
                }
            }
        })
        .await
    }

    /// Schema and statistics of a dataset merged across backends
    pub async fn get_dataset_metadata(
        &self,
        ctx: &QueryContext,
        dataset_id: &str,
    ) -> Result<DatasetMetadata> {
        with_deadline(ctx, async {
            let dataset = self
                .datasets
                .get_dataset(&ctx.merchant_id, dataset_id)
                .await
                .map_err(|e| dataset_info_failed(e, dataset_id))?;

            DatasetMetadata::merge(&dataset)
        })
        .await
    }

    /// Immediate upstream nodes of a dataset
    pub async fn get_dataset_parents(
        &self,
        ctx: &QueryContext,
        dataset_id: &str,
    ) -> Result<DatasetParents> {
        with_deadline(ctx, async {
            let parents = self
                .datasets
                .get_dataset_parents(&ctx.merchant_id, dataset_id)
                .await
                .map_err(|e| dataset_info_failed(e, dataset_id))?;

            Ok(DatasetParents::new(dataset_id, parents))
        })
        .await
    }

    /// One full orchestration against one backend kind
    async fn execute(
        &self,
        ctx: &QueryContext,
        kind: BackendKind,
        query_template: &str,
        params: &HashMap<String, String>,
    ) -> Result<QueryResult> {
        let instance_id = self.router.resolve(&ctx.merchant_id, kind)?;
        let source = self.registry.get_source(kind, &instance_id).await?;

        let resolved = self
            .resolve_dataset_params(ctx, kind, params, |table| {
                source.quote_table_name(table)
            })
            .await?;

        let filled = fill_template(query_template, &resolved.params)?;

        let translated = match self.translator.translate(&filled, kind).await {
            Ok(query) => query,
            Err(e) => {
                warn!(
                    trace_id = %ctx.trace_id,
                    "Dialect translation to {} failed, using untranslated query: {}",
                    kind, e
                );
                filled
            }
        };

        let annotated = annotate(kind, &translated, ctx);

        if resolved.has_dataset_params && resolved.table_names.is_empty() {
            return Err(DataError::NoTableNamesFound);
        }

        let table = resolved
            .table_names
            .first()
            .map(String::as_str)
            .unwrap_or_default();

        debug!(
            "Executing on {}/{} for merchant {}",
            kind, instance_id, ctx.merchant_id
        );
        let result = source.query(table, &annotated, &[]).await?;

        info!(
            merchant_id = %ctx.merchant_id,
            trace_id = %ctx.trace_id,
            "Query on {} returned {} rows",
            kind,
            result.row_count()
        );
        Ok(result)
    }

    /// Replace dataset references with the backend's quoted physical table names
    ///
    /// Datasets are looked up one at a time; empty references are skipped.
    async fn resolve_dataset_params(
        &self,
        ctx: &QueryContext,
        kind: BackendKind,
        params: &HashMap<String, String>,
        quote: impl Fn(&str) -> String,
    ) -> Result<ResolvedParams> {
        let mut resolved = ResolvedParams {
            params: HashMap::with_capacity(params.len()),
            table_names: Vec::new(),
            has_dataset_params: false,
        };

        // Sorted so that the first table name is deterministic
        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort();

        for key in keys {
            let value = &params[key];

            if !key.starts_with(&self.dataset_param_prefix) {
                resolved.params.insert(key.clone(), value.clone());
                continue;
            }

            resolved.has_dataset_params = true;
            if value.is_empty() {
                continue;
            }

            let dataset = self
                .datasets
                .get_dataset(&ctx.merchant_id, value)
                .await
                .map_err(|e| dataset_info_failed(e, value))?;

            let table = dataset.table_name(kind).ok_or_else(|| {
                DataError::DatasetNotFoundInProvider {
                    dataset_id: value.clone(),
                    kind,
                }
            })?;

            let quoted = quote(table);
            resolved.params.insert(key.clone(), quoted.clone());
            resolved.table_names.push(quoted);
        }

        Ok(resolved)
    }
}

fn dataset_info_failed(error: DataError, dataset_id: &str) -> DataError {
    warn!("Dataset lookup for '{}' failed: {}", dataset_id, error);
    error.into_dataset_info_failed(dataset_id)
}

/// Append merchant and trace comments for the backend's own query logs
fn annotate(kind: BackendKind, query: &str, ctx: &QueryContext) -> String {
    let query = query.trim_end();
    let query = query.strip_suffix(';').unwrap_or(query);

    let merchant_id = comment_safe(&ctx.merchant_id);
    let trace_id = comment_safe(&ctx.trace_id);

    match kind {
        BackendKind::RealtimeColumnar => format!(
            "{}\n-- merchant_id: {}, trace_id: {}",
            query, merchant_id, trace_id
        ),
        BackendKind::LakehouseSql | BackendKind::Relational => format!(
            "{}\n/* merchant_id: {}, trace_id: {} */",
            query, merchant_id, trace_id
        ),
    }
}

/// Ids are caller supplied; only identifier characters may reach a comment
fn comment_safe(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'))
        .collect()
}

async fn with_deadline<T>(
    ctx: &QueryContext,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    let Some(deadline) = ctx.deadline else {
        return fut.await;
    };

    let started = Instant::now();
    match tokio::time::timeout_at(deadline.into(), fut).await {
        Ok(result) => result,
        Err(_) => {
            let elapsed = started.elapsed().as_millis() as u64;
            warn!(trace_id = %ctx.trace_id, "Query timed out after {}ms", elapsed);
            Err(DataError::QueryTimeout(elapsed))
        }
    }
}
