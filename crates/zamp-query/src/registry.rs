use crate::error::{DataError, Result};
use crate::traits::DataSource;
use crate::types::{BackendKind, InstanceConfig, ProviderKey};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Factory trait for creating adapters from instance configuration
#[async_trait]
pub trait DataSourceFactory: Send + Sync {
    /// Get the backend kind this factory handles
    fn backend_kind(&self) -> BackendKind;

    /// Check that the connection parameters have the shape this backend expects
    fn validate(&self, config: &InstanceConfig) -> Result<()>;

    /// Create an adapter from configuration
    async fn create_source(&self, config: &InstanceConfig) -> Result<Arc<dyn DataSource>>;
}

/// Outcome of eager construction at boot
#[derive(Debug, Default)]
pub struct BootReport {
    /// Instances with a live adapter after boot
    pub initialized: Vec<ProviderKey>,
    /// Instances whose adapter could not be built; their configuration is
    /// retained and the adapter is rebuilt on first use
    pub failed: Vec<(ProviderKey, String)>,
}

impl BootReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Registry of live adapters keyed by (backend kind, instance id)
///
/// Configuration is kept separately from live adapters, so an adapter that
/// failed at boot or was evicted is rebuilt on the next lookup. Construction
/// for one key is serialized: concurrent lookups of a missing key build
/// exactly one adapter and all observe it.
pub struct ProviderRegistry {
    factories: Arc<RwLock<HashMap<BackendKind, Arc<dyn DataSourceFactory>>>>,
    configs: Arc<RwLock<HashMap<ProviderKey, InstanceConfig>>>,
    sources: Arc<RwLock<HashMap<ProviderKey, Arc<dyn DataSource>>>>,
    build_locks: Arc<Mutex<HashMap<ProviderKey, Arc<Mutex<()>>>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            factories: Arc::new(RwLock::new(HashMap::new())),
            configs: Arc::new(RwLock::new(HashMap::new())),
            sources: Arc::new(RwLock::new(HashMap::new())),
            build_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a factory for a backend kind
    pub async fn register_factory(&self, factory: Arc<dyn DataSourceFactory>) {
        let kind = factory.backend_kind();
        let mut factories = self.factories.write().await;

        if factories.contains_key(&kind) {
            warn!("Overwriting existing factory for backend: {}", kind);
        }

        factories.insert(kind, factory);
        debug!("Registered factory for backend: {}", kind);
    }

    /// Register every instance and build its adapter eagerly
    ///
    /// Fails as a whole on a duplicate key or on configuration that does not
    /// match its declared kind. A failure to construct one adapter does not
    /// fail boot; it is recorded in the returned report.
    pub async fn init_providers(&self, instances: Vec<InstanceConfig>) -> Result<BootReport> {
        let keys: Vec<ProviderKey> = instances.iter().map(InstanceConfig::key).collect();
        {
            // Check and insert under one guard
            let factories = self.factories.read().await;
            let mut configs = self.configs.write().await;
            let mut seen = HashSet::new();

            for instance in &instances {
                let key = instance.key();
                if configs.contains_key(&key) || !seen.insert(key) {
                    return Err(DataError::AlreadyInitialized {
                        kind: instance.kind,
                        instance_id: instance.instance_id.clone(),
                    });
                }

                let factory = factories.get(&instance.kind).ok_or_else(|| {
                    DataError::invalid_configuration(
                        instance.kind,
                        format!("no factory registered for backend {}", instance.kind),
                    )
                })?;
                factory.validate(instance)?;
            }

            for instance in instances {
                configs.insert(instance.key(), instance);
            }
        }

        let mut report = BootReport::default();
        for key in keys {
            match self.resolve(key.kind, &key.instance_id).await {
                Ok(_) => report.initialized.push(key),
                Err(e) => {
                    warn!(
                        "Failed to initialize provider {}: {}. It will be rebuilt on first use",
                        key, e
                    );
                    report.failed.push((key, e.to_string()));
                }
            }
        }

        info!(
            "Provider boot finished: {} initialized, {} failed",
            report.initialized.len(),
            report.failed.len()
        );

        Ok(report)
    }

    /// Return the live adapter for a key, building it from retained
    /// configuration when absent
    ///
    /// Errors carry the internal cause; use [`ProviderRegistry::get_source`]
    /// at outer boundaries.
    pub async fn resolve(
        &self,
        kind: BackendKind,
        instance_id: &str,
    ) -> Result<Arc<dyn DataSource>> {
        let key = ProviderKey::new(kind, instance_id);

        if let Some(source) = self.sources.read().await.get(&key) {
            return Ok(source.clone());
        }

        let config = self
            .configs
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| DataError::ConfigNotInitialized {
                kind,
                instance_id: instance_id.to_string(),
            })?;

        let lock = self.build_lock(&key).await;
        let _guard = lock.lock().await;

        // Another caller may have finished building while we waited
        if let Some(source) = self.sources.read().await.get(&key) {
            return Ok(source.clone());
        }

        let factory = self
            .factories
            .read()
            .await
            .get(&kind)
            .cloned()
            .ok_or_else(|| {
                DataError::invalid_configuration(
                    kind,
                    format!("no factory registered for backend {}", kind),
                )
            })?;

        debug!("Creating adapter for {}", key);
        let source = factory.create_source(&config).await?;

        self.sources.write().await.insert(key, source.clone());
        Ok(source)
    }

    /// Resolve an adapter, collapsing every failure to `ProviderServiceNotFound`
    pub async fn get_source(
        &self,
        kind: BackendKind,
        instance_id: &str,
    ) -> Result<Arc<dyn DataSource>> {
        self.resolve(kind, instance_id).await.map_err(|e| {
            warn!(
                "Provider {}/{} could not be resolved: {}",
                kind, instance_id, e
            );
            e.into_provider_not_found(kind, instance_id)
        })
    }

    /// Resolve an adapter as its concrete type
    pub async fn get_typed<T: DataSource>(
        &self,
        kind: BackendKind,
        instance_id: &str,
    ) -> Result<Arc<T>> {
        let source = self.get_source(kind, instance_id).await?;
        source.downcast_arc::<T>().map_err(|_| {
            DataError::invalid_configuration(
                kind,
                format!(
                    "adapter for instance '{}' has an unexpected type",
                    instance_id
                ),
            )
            .into_provider_not_found(kind, instance_id)
        })
    }

    /// Close and drop the live adapter; configuration is kept
    pub async fn evict(&self, kind: BackendKind, instance_id: &str) -> Result<()> {
        let key = ProviderKey::new(kind, instance_id);
        let removed = self.sources.write().await.remove(&key);

        if let Some(source) = removed {
            debug!("Closing adapter: {}", key);
            source.close().await?;
        }

        Ok(())
    }

    /// Close every live adapter
    pub async fn close_all(&self) {
        let mut sources = self.sources.write().await;

        for (key, source) in sources.drain() {
            if let Err(e) = source.close().await {
                warn!("Failed to close adapter {}: {}", key, e);
            }
        }
    }

    /// Keys with a live adapter
    pub async fn live_keys(&self) -> Vec<ProviderKey> {
        self.sources.read().await.keys().cloned().collect()
    }

    /// Whether configuration was registered for a key
    pub async fn has_config(&self, kind: BackendKind, instance_id: &str) -> bool {
        self.configs
            .read()
            .await
            .contains_key(&ProviderKey::new(kind, instance_id))
    }

    async fn build_lock(&self, key: &ProviderKey) -> Arc<Mutex<()>> {
        self.build_locks
            .lock()
            .await
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::QueryResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingSource {
        instance_id: String,
        closed: AtomicUsize,
    }

    #[async_trait]
    impl DataSource for CountingSource {
        fn backend_kind(&self) -> BackendKind {
            BackendKind::RealtimeColumnar
        }

        fn quote_table_name(&self, table_name: &str) -> String {
            table_name.to_string()
        }

        async fn query(
            &self,
            _table: &str,
            _query: &str,
            _args: &[serde_json::Value],
        ) -> Result<QueryResult> {
            Ok(QueryResult::default())
        }

        async fn close(&self) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl DataSourceFactory for CountingFactory {
        fn backend_kind(&self) -> BackendKind {
            BackendKind::RealtimeColumnar
        }

        fn validate(&self, config: &InstanceConfig) -> Result<()> {
            if config.connection_params.get("broker_url").is_none() {
                return Err(DataError::invalid_configuration(
                    config.kind,
                    "missing broker_url",
                ));
            }
            Ok(())
        }

        async fn create_source(&self, config: &InstanceConfig) -> Result<Arc<dyn DataSource>> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail_for.as_deref() == Some(config.instance_id.as_str()) {
                return Err(DataError::ConnectionFailed {
                    kind: config.kind,
                    message: "broker unreachable".to_string(),
                });
            }
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(CountingSource {
                instance_id: config.instance_id.clone(),
                closed: AtomicUsize::new(0),
            }))
        }
    }

    fn pinot(instance_id: &str) -> InstanceConfig {
        InstanceConfig::new(
            instance_id,
            BackendKind::RealtimeColumnar,
            serde_json::json!({"broker_url": "http://broker:8099"}),
        )
    }

    async fn registry_with(factory: Arc<CountingFactory>) -> ProviderRegistry {
        let registry = ProviderRegistry::new();
        registry.register_factory(factory).await;
        registry
    }

    #[tokio::test]
    async fn test_registry_creation() {
        let registry = ProviderRegistry::new();
        assert!(registry.live_keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_unknown_instance() {
        let registry = registry_with(Arc::new(CountingFactory::default())).await;

        let err = registry
            .resolve(BackendKind::RealtimeColumnar, "missing")
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::ConfigNotInitialized);

        let err = registry
            .get_source(BackendKind::RealtimeColumnar, "missing")
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::ProviderServiceNotFound);
    }

    #[tokio::test]
    async fn test_boot_rejects_duplicates() {
        let registry = registry_with(Arc::new(CountingFactory::default())).await;

        let err = registry
            .init_providers(vec![pinot("p1"), pinot("p1")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyInitialized);
        assert!(!registry.has_config(BackendKind::RealtimeColumnar, "p1").await);
    }

    #[tokio::test]
    async fn test_concurrent_boots_claim_key_once() {
        let registry = Arc::new(registry_with(Arc::new(CountingFactory::default())).await);

        let boots: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.init_providers(vec![pinot("p1")]).await })
            })
            .collect();

        let outcomes: Vec<_> = futures::future::join_all(boots)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
        for err in outcomes.iter().filter_map(|o| o.as_ref().err()) {
            assert_eq!(err.kind(), ErrorKind::AlreadyInitialized);
        }
    }

    #[tokio::test]
    async fn test_boot_rejects_invalid_configuration() {
        let registry = registry_with(Arc::new(CountingFactory::default())).await;

        let bad = InstanceConfig::new(
            "p1",
            BackendKind::RealtimeColumnar,
            serde_json::json!({"dsn": "postgres://"}),
        );
        let err = registry.init_providers(vec![bad]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

        let no_factory = InstanceConfig::new(
            "pg",
            BackendKind::Relational,
            serde_json::json!({"dsn": "postgres://"}),
        );
        let err = registry.init_providers(vec![no_factory]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[tokio::test]
    async fn test_boot_failure_is_reported_and_rebuilt_lazily() {
        let factory = Arc::new(CountingFactory {
            created: AtomicUsize::new(0),
            fail_for: Some("p2".to_string()),
        });
        let registry = registry_with(factory.clone()).await;

        let report = registry
            .init_providers(vec![pinot("p1"), pinot("p2")])
            .await
            .unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.initialized.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0.instance_id, "p2");
        assert!(registry.has_config(BackendKind::RealtimeColumnar, "p2").await);
        assert_eq!(registry.live_keys().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolve_builds_once() {
        let factory = Arc::new(CountingFactory::default());
        let registry = Arc::new(registry_with(factory.clone()).await);
        {
            let mut configs = registry.configs.write().await;
            configs.insert(pinot("p1").key(), pinot("p1"));
        }

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .resolve(BackendKind::RealtimeColumnar, "p1")
                        .await
                        .unwrap()
                })
            })
            .collect();

        let sources: Vec<Arc<dyn DataSource>> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        for source in &sources[1..] {
            assert!(Arc::ptr_eq(&sources[0], source));
        }
    }

    #[tokio::test]
    async fn test_evict_rebuilds_from_retained_config() {
        let factory = Arc::new(CountingFactory::default());
        let registry = registry_with(factory.clone()).await;
        registry.init_providers(vec![pinot("p1")]).await.unwrap();

        let first = registry
            .get_typed::<CountingSource>(BackendKind::RealtimeColumnar, "p1")
            .await
            .unwrap();
        assert_eq!(first.instance_id, "p1");

        registry
            .evict(BackendKind::RealtimeColumnar, "p1")
            .await
            .unwrap();
        assert_eq!(first.closed.load(Ordering::SeqCst), 1);
        assert!(registry.live_keys().await.is_empty());

        let second = registry
            .get_source(BackendKind::RealtimeColumnar, "p1")
            .await
            .unwrap();
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert!(!Arc::ptr_eq(
            &(first as Arc<dyn DataSource>),
            &second
        ));
    }
}
