//! Jobs API 2.1 client used for batch runs
//!
//! Shares the workspace credentials of the SQL adapter but is not part of the
//! query path.

use crate::client::ApiClient;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use zamp_query::Result;

#[derive(Debug, Serialize)]
struct RunNowRequest<'a> {
    job_id: i64,
    job_parameters: &'a HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RunNowResponse {
    run_id: i64,
}

#[derive(Debug, Serialize)]
struct CancelRunRequest {
    run_id: i64,
}

#[derive(Debug, Deserialize)]
struct Empty {}

/// Status of a job run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunStatus {
    pub run_id: i64,
    #[serde(default)]
    pub state: RunState,
    #[serde(default)]
    pub run_page_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunState {
    /// PENDING, RUNNING, TERMINATING, TERMINATED, SKIPPED, INTERNAL_ERROR
    #[serde(default)]
    pub life_cycle_state: Option<String>,
    /// SUCCESS, FAILED, TIMEDOUT, CANCELED; set once terminated
    #[serde(default)]
    pub result_state: Option<String>,
    #[serde(default)]
    pub state_message: Option<String>,
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self.state.life_cycle_state.as_deref(),
            Some("TERMINATED") | Some("SKIPPED") | Some("INTERNAL_ERROR")
        )
    }

    pub fn is_success(&self) -> bool {
        self.state.result_state.as_deref() == Some("SUCCESS")
    }
}

/// Job submission and run-status client
#[derive(Clone)]
pub struct DatabricksJobs {
    api: ApiClient,
}

impl DatabricksJobs {
    pub(crate) fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Trigger a run of an existing job, returning the run id
    pub async fn run_now(
        &self,
        job_id: i64,
        job_parameters: &HashMap<String, String>,
    ) -> Result<i64> {
        let response: RunNowResponse = self
            .api
            .post(
                "/api/2.1/jobs/run-now",
                &RunNowRequest {
                    job_id,
                    job_parameters,
                },
            )
            .await?;

        info!("Started Databricks job {} run {}", job_id, response.run_id);
        Ok(response.run_id)
    }

    pub async fn get_run(&self, run_id: i64) -> Result<RunStatus> {
        self.api
            .get(&format!("/api/2.1/jobs/runs/get?run_id={}", run_id))
            .await
    }

    pub async fn cancel_run(&self, run_id: i64) -> Result<()> {
        let _: Empty = self
            .api
            .post("/api/2.1/jobs/runs/cancel", &CancelRunRequest { run_id })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn jobs(server: &MockServer) -> DatabricksJobs {
        DatabricksJobs::new(ApiClient::new(&server.uri(), "tok", Duration::from_secs(5)).unwrap())
    }

    #[tokio::test]
    async fn test_run_now_and_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/2.1/jobs/run-now"))
            .and(body_json(json!({"job_id": 11, "job_parameters": {"merchant_id": "m1"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"run_id": 99})))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/2.1/jobs/runs/get"))
            .and(query_param("run_id", "99"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "run_id": 99,
                "state": {"life_cycle_state": "TERMINATED", "result_state": "SUCCESS"},
                "run_page_url": "https://example/run/99"
            })))
            .mount(&server)
            .await;

        let client = jobs(&server);
        let params = HashMap::from([("merchant_id".to_string(), "m1".to_string())]);

        let run_id = client.run_now(11, &params).await.unwrap();
        assert_eq!(run_id, 99);

        let status = client.get_run(run_id).await.unwrap();
        assert!(status.is_finished());
        assert!(status.is_success());
    }

    #[tokio::test]
    async fn test_cancel_run() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/2.1/jobs/runs/cancel"))
            .and(body_json(json!({"run_id": 5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        jobs(&server).cancel_run(5).await.unwrap();
    }
}
