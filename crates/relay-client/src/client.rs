use anyhow::{Context, Result};
use forwarder_relayer::types::{ErrorResponse, HealthResponse, RelayRequest, RelayResponse};
use reqwest::{Client, Response};

/// HTTP client for the relayer's /relay and /health endpoints
#[derive(Clone)]
pub struct RelayerClient {
    client: Client,
    base_url: String,
}

impl RelayerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Submit a signed request for execution
    pub async fn relay(&self, request: &RelayRequest) -> Result<RelayResponse> {
        let url = format!("{}/relay", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .context("Failed to send relay request")?;

        let response = error_for_status(response, "Relay").await?;
        let body = response
            .text()
            .await
            .context("Failed to read relay response body")?;
        serde_json::from_str(&body).with_context(|| {
            let truncated: String = body.chars().take(200).collect();
            format!("Failed to parse relay response: {}", truncated)
        })
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send health request")?;

        let response = error_for_status(response, "Health").await?;
        response
            .json()
            .await
            .context("Failed to parse health response")
    }
}

/// Turns a non-2xx response into an error carrying the relayer's `error` message.
async fn error_for_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<could not read body>".to_string());
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    anyhow::bail!("{what} request failed with status {status}: {message}")
}
