//! Downstream dependency client.
//!
//! # Responsibilities
//! - Issue GET requests against the configured downstream service
//! - Enforce an explicit per-call timeout on every request
//! - Distinguish timeout from other failures so probes can surface
//!   504 versus 502
//!
//! # Design Decisions
//! - Every call takes a timeout; there is no untimed variant
//! - No retries: failures are surfaced raw for observation

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::Value;

use crate::config::DownstreamConfig;

/// Maximum downstream response body the client will buffer.
const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024;

/// Failure modes of a downstream call.
#[derive(Debug, thiserror::Error)]
pub enum DownstreamError {
    #[error("downstream call timed out after {0:?}")]
    Timeout(Duration),

    #[error("downstream returned status {0}")]
    Status(u16),

    #[error("downstream request failed: {0}")]
    Transport(String),

    #[error("downstream returned an unreadable body: {0}")]
    InvalidBody(String),
}

impl DownstreamError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DownstreamError::Timeout(_))
    }
}

/// HTTP client for the downstream collaborator.
#[derive(Clone)]
pub struct DownstreamClient {
    base_url: String,
    default_timeout: Duration,
    slow_call_delay: Duration,
    client: Client<HttpConnector, Body>,
}

impl DownstreamClient {
    pub fn new(config: &DownstreamConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_timeout: Duration::from_secs(config.default_timeout_secs),
            slow_call_delay: Duration::from_secs(config.slow_call_delay_secs),
            client,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Delay, in seconds, the probes ask the downstream /slow endpoint for.
    pub fn slow_call_delay_secs(&self) -> u64 {
        self.slow_call_delay.as_secs()
    }

    /// Issue a GET with query parameters and an explicit timeout.
    ///
    /// Returns the parsed JSON payload on success, or a discriminated
    /// [`DownstreamError`] for timeout, transport, status, and body failures.
    pub async fn call(
        &self,
        path: &str,
        params: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Value, DownstreamError> {
        let uri = self.build_uri(path, params);
        let request = Request::builder()
            .method(Method::GET)
            .uri(&uri)
            .body(Body::empty())
            .map_err(|e| DownstreamError::Transport(e.to_string()))?;

        // One deadline covers the whole call: a peer that answers headers
        // and then stalls the body cannot stretch the budget to two timeouts.
        let deadline = tokio::time::Instant::now() + timeout;

        let response = match tokio::time::timeout_at(deadline, self.client.request(request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(DownstreamError::Transport(e.to_string())),
            Err(_) => return Err(DownstreamError::Timeout(timeout)),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DownstreamError::Status(status.as_u16()));
        }

        let bytes = match tokio::time::timeout_at(
            deadline,
            axum::body::to_bytes(Body::new(response.into_body()), MAX_RESPONSE_BYTES),
        )
        .await
        {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return Err(DownstreamError::InvalidBody(e.to_string())),
            Err(_) => return Err(DownstreamError::Timeout(timeout)),
        };

        serde_json::from_slice(&bytes).map_err(|e| DownstreamError::InvalidBody(e.to_string()))
    }

    fn build_uri(&self, path: &str, params: &[(&str, &str)]) -> String {
        let mut uri = format!("{}{}", self.base_url, path);
        if !params.is_empty() {
            let query = params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            uri.push('?');
            uri.push_str(&query);
        }
        uri
    }
}
