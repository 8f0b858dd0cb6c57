//! HTTP endpoints of the relayer.
//!
//! - `GET /` – endpoint documentation
//! - `GET /health` – liveness, never blocked by the RPC connection
//! - `POST /relay` – verify a signed forward request and execute it

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{Html, Response};
use axum::routing::{get, post};
use axum::{Json, Router, response::IntoResponse};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use crate::chain::{ForwarderChain, RelayError};
use crate::relay::Relayer;
use crate::types::{ErrorResponse, RelayRequest};

pub fn routes<P>() -> Router<Arc<Relayer<P>>>
where
    P: ForwarderChain + 'static,
{
    Router::new()
        .route("/", get(get_root))
        .route("/health", get(get_health::<P>))
        .route("/relay", post(post_relay::<P>))
}

/// `GET /`: Returns API information with links to all available endpoints.
#[instrument(skip_all)]
pub async fn get_root() -> impl IntoResponse {
    let pkg_version = env!("CARGO_PKG_VERSION");
    let pkg_description = env!("CARGO_PKG_DESCRIPTION");

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>MinimalForwarder Relayer</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; max-width: 900px; margin: 0 auto; padding: 20px; }}
        details {{ margin: 10px 0; }}
        summary {{ cursor: pointer; padding: 8px; background: #f5f5f5; border-radius: 4px; }}
        summary strong {{ font-family: monospace; }}
        pre {{ background: #f8f8f8; padding: 15px; border-radius: 4px; overflow-x: auto; font-size: 13px; line-height: 1.4; }}
        .method-get {{ color: #22863a; }}
        .method-post {{ color: #6f42c1; }}
    </style>
</head>
<body>
    <h1>MinimalForwarder Relayer</h1>
    <p>Version: {pkg_version}</p>
    <p>{pkg_description}</p>

    <h2>Available Endpoints</h2>

    <details>
        <summary><strong class="method-get">GET</strong> <strong><a href="/health">/health</a></strong> – Health check</summary>
        <pre>Response:
{{
  "status": "ok",
  "forwarderAddress": "0x...",
  "chainId": 11155111            // omitted until the RPC has answered
}}</pre>
    </details>

    <details>
        <summary><strong class="method-post">POST</strong> <strong>/relay</strong> – Execute a signed forward request</summary>
        <pre>Request Body:
{{
  "request": {{
    "from": "0x...",             // signer address
    "to": "0x...",               // target contract
    "value": "0",
    "gas": "100000",             // gas forwarded to the target call
    "nonce": "0",                // MinimalForwarder.getNonce(from)
    "data": "0x..."              // target calldata
  }},
  "signature": "0x..."           // 65-byte EIP-712 signature
}}

EIP-712 domain:
{{ "name": "MinimalForwarder", "version": "0.0.1", "chainId": &lt;chain&gt;, "verifyingContract": &lt;forwarder&gt; }}

Response (200):
{{ "success": true, "txHash": "0x...", "gasUsed": "51234" }}

Errors:
400 {{ "error": "Invalid signature" }}      // malformed body, bad signature, stale nonce
500 {{ "error": "..." }}                    // RPC failure, revert, receipt timeout</pre>
    </details>
</body>
</html>"#
    );

    Html(html)
}

/// `GET /health`: reports the configured forwarder and, once known, the chain id.
#[instrument(skip_all)]
pub async fn get_health<P>(State(relayer): State<Arc<Relayer<P>>>) -> impl IntoResponse
where
    P: ForwarderChain,
{
    (StatusCode::OK, Json(relayer.health()))
}

/// `POST /relay`: verifies the signature against the relayer's own domain and submits
/// `execute(request, signature)` from the relayer account.
///
/// Any structural problem with the body, including a JSON syntax error or a missing
/// content type, is answered with 400.
#[instrument(skip_all)]
pub async fn post_relay<P>(
    State(relayer): State<Arc<Relayer<P>>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response
where
    P: ForwarderChain,
{
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return RelayError::MalformedRequest(rejection.body_text()).into_response();
        }
    };
    let request: RelayRequest = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(e) => return RelayError::MalformedRequest(e.to_string()).into_response(),
    };

    match relayer.relay(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => error.into_response(),
    }
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        if self.is_rejection() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Relay failed upstream");
        } else {
            tracing::info!(error = %self, "Relay request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
