use crate::error::Result;
use crate::types::*;
use async_trait::async_trait;
use downcast_rs::{impl_downcast, DowncastSync};

/// Core trait that every backend adapter implements
///
/// An adapter owns a live connection or client for one backend instance and
/// executes SQL against it. Adapters are shared across concurrent requests,
/// so the underlying connection must be pooled or otherwise safe for
/// concurrent use.
#[async_trait]
pub trait DataSource: DowncastSync {
    /// Backend kind served by this adapter
    fn backend_kind(&self) -> BackendKind;

    /// Build the table reference used in SQL for a physical table name,
    /// applying the backend's identifier quoting
    fn quote_table_name(&self, table_name: &str) -> String;

    /// Execute a query and return the normalized result
    ///
    /// `table` is the resolved physical table the query targets (empty when
    /// the query does not reference a dataset); `args` are positional bind
    /// parameters.
    async fn query(
        &self,
        table: &str,
        query: &str,
        args: &[serde_json::Value],
    ) -> Result<QueryResult>;

    /// Release the underlying connection
    async fn close(&self) -> Result<()>;
}

impl_downcast!(sync DataSource);

/// Telemetry sink for backend failures
///
/// Fire-and-forget: implementations must not fail and callers never inspect
/// the outcome.
pub trait ErrorReporter: Send + Sync {
    fn capture_exception(
        &self,
        error: &crate::error::DataError,
        context: &str,
        tags: &[(&str, &str)],
    );
}

/// Reports failures as structured `tracing` error events
#[derive(Debug, Default, Clone)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn capture_exception(
        &self,
        error: &crate::error::DataError,
        context: &str,
        tags: &[(&str, &str)],
    ) {
        let tags = tags
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        tracing::error!(
            error_kind = %error.kind(),
            context = context,
            tags = %tags,
            "{}",
            error
        );
    }
}

/// Quote every dot-separated segment independently: `a.b.c` -> `"a"."b"."c"`
pub fn quote_segments(name: &str) -> String {
    name.split('.')
        .map(quote_single)
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote the whole name as one identifier: `a.b` -> `"a.b"`
pub fn quote_single(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_segments() {
        assert_eq!(quote_segments("cat.schema.ds1"), r#""cat"."schema"."ds1""#);
        assert_eq!(quote_segments("events"), r#""events""#);
    }

    #[test]
    fn test_quote_single_ignores_dots() {
        assert_eq!(quote_single("events_REALTIME"), r#""events_REALTIME""#);
        assert_eq!(quote_single("a.b.c"), r#""a.b.c""#);
    }

    #[test]
    fn test_quote_doubles_embedded_quotes() {
        assert_eq!(quote_single(r#"a"b"#), r#""a""b""#);
        assert_eq!(quote_segments(r#"cat.we"ird.t"#), r#""cat"."we""ird"."t""#);
    }
}
