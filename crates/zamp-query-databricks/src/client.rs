use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use zamp_query::{BackendKind, DataError, Result};

const KIND: BackendKind = BackendKind::LakehouseSql;

/// Authenticated HTTP client for one Databricks workspace
#[derive(Clone)]
pub(crate) struct ApiClient {
    client: Client,
    host: String,
    token: String,
}

impl ApiClient {
    pub(crate) fn new(host: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataError::ConnectionFailed {
                kind: KIND,
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            host: normalize_host(host),
            token: token.to_string(),
        })
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.client.get(self.url(path));
        self.send(request, path).await
    }

    pub(crate) async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.client.post(self.url(path)).json(body);
        self.send(request, path).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, path: &str) -> Result<T> {
        debug!("Databricks API request: {}", path);

        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| DataError::backend(KIND, format!("API request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DataError::backend(KIND, format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(DataError::backend(
                KIND,
                format!("API returned status {}: {}", status, body),
            ));
        }

        serde_json::from_str(&body)
            .map_err(|e| DataError::json_decode(format!("Databricks response from {}", path), e))
    }
}

/// Workspace hosts are configured with or without a scheme
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}
