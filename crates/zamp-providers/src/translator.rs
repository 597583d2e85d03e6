//! Dialect translation collaborators
//!
//! Translation is best-effort: the orchestrator logs a failure and runs the
//! untranslated query.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use zamp_query::{BackendKind, DataError, Result};

#[async_trait]
pub trait DialectTranslator: Send + Sync {
    /// Rewrite a query into the dialect of the target backend
    async fn translate(&self, query: &str, target: BackendKind) -> Result<String>;
}

/// Returns queries unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTranslator;

#[async_trait]
impl DialectTranslator for PassthroughTranslator {
    async fn translate(&self, query: &str, _target: BackendKind) -> Result<String> {
        Ok(query.to_string())
    }
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    query: &'a str,
    target_dialect: &'static str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    query: String,
}

/// HTTP client for the Rosetta translation service
pub struct RosettaTranslator {
    client: Client,
    url: String,
}

impl RosettaTranslator {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DataError::TranslationFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DialectTranslator for RosettaTranslator {
    async fn translate(&self, query: &str, target: BackendKind) -> Result<String> {
        let dialect = target.product_name();
        debug!("Translating query to {}", dialect);

        let response = self
            .client
            .post(format!("{}/translate", self.url))
            .json(&TranslateRequest {
                query,
                target_dialect: dialect,
            })
            .send()
            .await
            .map_err(|e| DataError::TranslationFailed(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DataError::TranslationFailed(format!(
                "service returned {}: {}",
                status, body
            )));
        }

        let translated: TranslateResponse = response
            .json()
            .await
            .map_err(|e| DataError::TranslationFailed(format!("invalid response: {}", e)))?;

        Ok(translated.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zamp_query::ErrorKind;

    #[tokio::test]
    async fn test_translate() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(body_json(json!({
                "query": "SELECT NOW()",
                "target_dialect": "pinot"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"query": "SELECT now()"})),
            )
            .mount(&server)
            .await;

        let translator = RosettaTranslator::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let out = translator
            .translate("SELECT NOW()", BackendKind::RealtimeColumnar)
            .await
            .unwrap();

        assert_eq!(out, "SELECT now()");
    }

    #[tokio::test]
    async fn test_translate_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(ResponseTemplate::new(422).set_body_string("unsupported function"))
            .mount(&server)
            .await;

        let translator = RosettaTranslator::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = translator
            .translate("SELECT x", BackendKind::LakehouseSql)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TranslationFailed);
        assert!(err.to_string().contains("unsupported function"));
    }

    #[test]
    fn test_passthrough() {
        let out = tokio_test::block_on(
            PassthroughTranslator.translate("SELECT 1", BackendKind::Relational),
        )
        .unwrap();
        assert_eq!(out, "SELECT 1");
    }
}
