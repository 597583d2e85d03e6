use crate::types::BackendKind;
use std::fmt;
use thiserror::Error;

/// Unified error type for routing, execution and result normalization
#[derive(Error, Debug)]
pub enum DataError {
    /// No configuration was registered at boot for this instance
    #[error("Configuration not initialized for {kind} instance '{instance_id}'")]
    ConfigNotInitialized {
        kind: BackendKind,
        instance_id: String,
    },

    /// The same (kind, instance) appeared twice at boot
    #[error("Provider {kind} instance '{instance_id}' is already initialized")]
    AlreadyInitialized {
        kind: BackendKind,
        instance_id: String,
    },

    /// Connection parameters do not match the declared backend kind
    #[error("Invalid configuration for backend {kind}: {message}")]
    InvalidConfiguration { kind: BackendKind, message: String },

    /// Backend kind is not served by this path
    #[error("Unsupported provider type: {0}")]
    UnsupportedProviderType(BackendKind),

    /// Registry boundary error; the internal cause is kept as the source
    #[error("Provider service not found for {kind} instance '{instance_id}'")]
    ProviderServiceNotFound {
        kind: BackendKind,
        instance_id: String,
        #[source]
        source: Box<DataError>,
    },

    /// Could not open a connection or build a client
    #[error("Connection to {kind} failed: {message}")]
    ConnectionFailed { kind: BackendKind, message: String },

    /// Catalog lookup returned zero rows
    #[error("Dataset '{dataset_id}' not found for merchant '{merchant_id}'")]
    DatasetNotFound {
        merchant_id: String,
        dataset_id: String,
    },

    /// Dataset exists but has no physical table on the target backend
    #[error("Dataset '{dataset_id}' has no table in {kind}")]
    DatasetNotFoundInProvider {
        dataset_id: String,
        kind: BackendKind,
    },

    /// Orchestrator boundary error for dataset lookups
    #[error("Getting dataset info failed for '{dataset_id}'")]
    GettingDatasetInfoFailed {
        dataset_id: String,
        #[source]
        source: Box<DataError>,
    },

    #[error("Template parsing failed: {0}")]
    TemplateParsingFailed(String),

    #[error("No table names found for dataset parameters")]
    NoTableNamesFound,

    /// Statement execution failed on the backend
    #[error("{kind} query failed: {message}")]
    BackendQueryFailed { kind: BackendKind, message: String },

    #[error("Broker response has no result table")]
    ResultTableMissing,

    #[error("Result table declares no columns")]
    NoColumns,

    /// Serialized exception payload reported by the broker
    #[error("Query exceptions: {0}")]
    QueryExceptions(String),

    #[error("Invalid numeric value '{value}' in column '{column}'")]
    InvalidNumericValue { column: String, value: String },

    #[error("JSON decode failed for {context}: {source}")]
    JsonDecodeFailed {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Dialect translation failed; callers log and continue
    #[error("Dialect translation failed: {0}")]
    TranslationFailed(String),

    /// Caller deadline elapsed
    #[error("Query timeout after {0}ms")]
    QueryTimeout(u64),
}

/// Stable error kinds callers branch on
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    ConfigNotInitialized,
    AlreadyInitialized,
    InvalidConfiguration,
    UnsupportedProviderType,
    ProviderServiceNotFound,
    ConnectionFailed,
    DatasetNotFound,
    DatasetNotFoundInProvider,
    GettingDatasetInfoFailed,
    TemplateParsingFailed,
    NoTableNamesFound,
    BackendQueryFailed(BackendKind),
    ResultTableMissing,
    NoColumns,
    QueryExceptions,
    InvalidNumericValue,
    JsonDecodeFailed,
    TranslationFailed,
    QueryTimeout,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::BackendQueryFailed(kind) => write!(f, "BackendQueryFailed({})", kind),
            other => write!(f, "{:?}", other),
        }
    }
}

impl DataError {
    /// Stable kind of this error, without the cause
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataError::ConfigNotInitialized { .. } => ErrorKind::ConfigNotInitialized,
            DataError::AlreadyInitialized { .. } => ErrorKind::AlreadyInitialized,
            DataError::InvalidConfiguration { .. } => ErrorKind::InvalidConfiguration,
            DataError::UnsupportedProviderType(_) => ErrorKind::UnsupportedProviderType,
            DataError::ProviderServiceNotFound { .. } => ErrorKind::ProviderServiceNotFound,
            DataError::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            DataError::DatasetNotFound { .. } => ErrorKind::DatasetNotFound,
            DataError::DatasetNotFoundInProvider { .. } => ErrorKind::DatasetNotFoundInProvider,
            DataError::GettingDatasetInfoFailed { .. } => ErrorKind::GettingDatasetInfoFailed,
            DataError::TemplateParsingFailed(_) => ErrorKind::TemplateParsingFailed,
            DataError::NoTableNamesFound => ErrorKind::NoTableNamesFound,
            DataError::BackendQueryFailed { kind, .. } => ErrorKind::BackendQueryFailed(*kind),
            DataError::ResultTableMissing => ErrorKind::ResultTableMissing,
            DataError::NoColumns => ErrorKind::NoColumns,
            DataError::QueryExceptions(_) => ErrorKind::QueryExceptions,
            DataError::InvalidNumericValue { .. } => ErrorKind::InvalidNumericValue,
            DataError::JsonDecodeFailed { .. } => ErrorKind::JsonDecodeFailed,
            DataError::TranslationFailed(_) => ErrorKind::TranslationFailed,
            DataError::QueryTimeout(_) => ErrorKind::QueryTimeout,
        }
    }

    /// Create a backend query failure
    pub fn backend(kind: BackendKind, msg: impl Into<String>) -> Self {
        DataError::BackendQueryFailed {
            kind,
            message: msg.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(kind: BackendKind, msg: impl Into<String>) -> Self {
        DataError::InvalidConfiguration {
            kind,
            message: msg.into(),
        }
    }

    /// Create a JSON decode error with context
    pub fn json_decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        DataError::JsonDecodeFailed {
            context: context.into(),
            source,
        }
    }

    /// Wrap as the registry's single boundary error
    pub fn into_provider_not_found(self, kind: BackendKind, instance_id: &str) -> Self {
        DataError::ProviderServiceNotFound {
            kind,
            instance_id: instance_id.to_string(),
            source: Box::new(self),
        }
    }

    /// Wrap as the orchestrator's dataset lookup boundary error
    pub fn into_dataset_info_failed(self, dataset_id: &str) -> Self {
        DataError::GettingDatasetInfoFailed {
            dataset_id: dataset_id.to_string(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_collapsed_error_keeps_cause() {
        let inner = DataError::ConfigNotInitialized {
            kind: BackendKind::RealtimeColumnar,
            instance_id: "pinot-1".to_string(),
        };
        let outer = inner.into_provider_not_found(BackendKind::RealtimeColumnar, "pinot-1");

        assert_eq!(outer.kind(), ErrorKind::ProviderServiceNotFound);
        let source = outer.source().unwrap().downcast_ref::<DataError>().unwrap();
        assert_eq!(source.kind(), ErrorKind::ConfigNotInitialized);
    }

    #[test]
    fn test_backend_failure_kind_carries_backend() {
        let err = DataError::backend(BackendKind::LakehouseSql, "warehouse stopped");
        assert_eq!(
            err.kind(),
            ErrorKind::BackendQueryFailed(BackendKind::LakehouseSql)
        );
        assert_eq!(err.to_string(), "lakehouse_sql query failed: warehouse stopped");
        assert_eq!(
            err.kind().to_string(),
            "BackendQueryFailed(lakehouse_sql)"
        );
    }
}
