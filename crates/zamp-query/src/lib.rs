//! # zamp-query
//!
//! Core abstractions for routing queries to heterogeneous analytical backends.
//!
//! Three backend kinds are supported:
//! - real-time columnar store (Apache Pinot broker)
//! - lakehouse SQL warehouse (Databricks SQL)
//! - relational database (PostgreSQL)
//!
//! ## Architecture
//!
//! - **DataSource**: the adapter contract every backend implements: a single
//!   `query(table, sql, args)` call plus identifier quoting
//! - **DataSourceFactory**: builds an adapter from an [`InstanceConfig`]
//! - **ProviderRegistry**: live adapters keyed by (kind, instance id), rebuilt
//!   from retained configuration when missing
//! - **result**: normalization of driver rows and broker JSON into one
//!   [`QueryResult`]
//!
//! ## Example
//!
//! ```rust
//! use zamp_query::{BackendKind, ProviderRegistry};
//!
//! # async fn example() -> zamp_query::Result<()> {
//! let registry = ProviderRegistry::new();
//!
//! // Factories are registered by the backend crates, then instances are
//! // built at boot:
//! // registry.register_factory(Arc::new(PinotFactory::default())).await;
//! // let report = registry.init_providers(instances).await?;
//!
//! // let source = registry.get_source(BackendKind::RealtimeColumnar, "pinot-default").await?;
//! # let _ = (registry, BackendKind::RealtimeColumnar);
//! # Ok(())
//! # }
//! ```
//!
//! Backend crates:
//! - `zamp-query-pinot`
//! - `zamp-query-databricks`
//! - `zamp-query-postgres`

pub mod error;
pub mod registry;
pub mod result;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use error::{DataError, ErrorKind, Result};
pub use registry::{BootReport, DataSourceFactory, ProviderRegistry};
pub use result::{BrokerResponse, DataSchema, ResultTable};
pub use traits::{quote_segments, quote_single, DataSource, ErrorReporter, TracingErrorReporter};
pub use types::{
    BackendKind, ColumnMetadata, DataRow, InstanceConfig, ProviderKey, QueryResult,
};
