//! reqwest-backed pull channel.

use super::PullChannel;
use crate::errors::{HarnessError, PullError};
use crate::identity::ClientIdentity;
use crate::protocol::{ProgressEvent, StartRequest, StartResponse, StatusResponse, TaskId};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const ANALYZE_PATH: &str = "api/portfolio/analyze";
const STATUS_PATH: &str = "api/portfolio/status";
const RESULT_PATH: &str = "api/portfolio/result";

/// Pull channel speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPullChannel {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPullChannel {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &Url, request_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("portfolio-harness/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl PullChannel for HttpPullChannel {
    async fn start_task(
        &self,
        identity: &ClientIdentity,
        portfolio_types: &[String],
        calculation_type: &str,
    ) -> Result<TaskId, PullError> {
        let body = StartRequest {
            user_id: identity.to_string(),
            portfolio_types: portfolio_types.to_vec(),
            calculation_type: calculation_type.to_string(),
        };

        let resp = self
            .client
            .post(self.url(ANALYZE_PATH))
            .json(&body)
            .send()
            .await
            .map_err(|e| PullError::Start {
                detail: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(PullError::Start {
                detail: error_detail(resp).await,
            });
        }

        let started: StartResponse = resp.json().await.map_err(|e| PullError::Start {
            detail: format!("invalid start response: {e}"),
        })?;
        debug!(task_id = %started.task_id, websocket_url = ?started.websocket_url, "Analysis started");
        Ok(started.task_id)
    }

    async fn fetch_status(&self, task_id: &str) -> Result<ProgressEvent, PullError> {
        let resp = self
            .client
            .get(self.url(&format!("{STATUS_PATH}/{task_id}")))
            .send()
            .await
            .map_err(|e| PullError::Status {
                detail: e.to_string(),
                http_status: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PullError::Status {
                detail: error_detail(resp).await,
                http_status: Some(status.as_u16()),
            });
        }

        let body: StatusResponse = resp.json().await.map_err(|e| PullError::Status {
            detail: format!("invalid status response: {e}"),
            http_status: Some(status.as_u16()),
        })?;
        Ok(body.into())
    }

    async fn fetch_result(&self, task_id: &str) -> Result<Value, PullError> {
        let resp = self
            .client
            .get(self.url(&format!("{RESULT_PATH}/{task_id}")))
            .send()
            .await
            .map_err(|e| PullError::Result {
                detail: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(PullError::Result {
                detail: error_detail(resp).await,
            });
        }

        resp.json().await.map_err(|e| PullError::Result {
            detail: format!("invalid result response: {e}"),
        })
    }

    async fn check_health(&self) -> Result<(), HarnessError> {
        let unreachable = |detail: String| HarnessError::ServerUnreachable {
            url: self.base_url.clone(),
            detail,
        };
        let resp = self
            .client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;
        if resp.status().is_server_error() {
            return Err(unreachable(format!("HTTP {}", resp.status())));
        }
        Ok(())
    }
}

/// Best-effort error detail for a non-2xx response.
async fn error_detail(resp: reqwest::Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    detail_from_body(status, &body)
}

/// Precedence: JSON `detail` field, then the raw body, then the status line.
fn detail_from_body(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body)
        && let Some(detail) = value.get("detail")
    {
        return match detail {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    format!("HTTP {status}")
}
