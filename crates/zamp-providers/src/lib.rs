//! Query orchestration over the zamp-query backends
//!
//! Routes tenant queries to backend instances, resolves dataset references to
//! physical tables, fills and translates query templates, and executes them
//! through the provider registry.

pub mod config;
pub mod datasets;
pub mod metadata;
pub mod query_service;
pub mod routing;
pub mod services;
pub mod template;
pub mod translator;

pub use config::{ConfigError, QueryEngineConfig};
pub use datasets::{Dataset, DatasetParent, DatasetStore, LakehouseDatasetStore};
pub use metadata::{ColumnSchema, DatasetMetadata, DatasetNode, DatasetParents};
pub use query_service::{QueryContext, QueryService};
pub use routing::InstanceRouter;
pub use services::{bootstrap, build_query_service, build_registry, get_service, ProviderService};
pub use translator::{DialectTranslator, PassthroughTranslator, RosettaTranslator};
