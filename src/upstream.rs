use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::config::ProxyConfig;
use crate::conversation::ConversationTurn;
use crate::error::ProxyError;

// Body accepted by the hosted chat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamRequest {
    pub message: String,
    pub history: Vec<ConversationTurn>,
}

/// Whatever JSON the upstream service answered with. Field normalization
/// happens in [`crate::proxy`], so nothing here is assumed about its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply(pub serde_json::Value);

impl UpstreamReply {
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    url: String,
}

impl UpstreamClient {
    pub fn new(config: &ProxyConfig) -> Result<Self, ProxyError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.upstream_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ProxyError::UpstreamTransport)?;
        Ok(Self {
            http,
            url: config.upstream_url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One POST, no retry.
    #[instrument(skip(self, request), fields(url = %self.url, history = request.history.len()))]
    pub async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamReply, ProxyError> {
        debug!(prompt = %request.message, "Sending prompt upstream");

        let response = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(ProxyError::UpstreamTransport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %body, "Upstream request failed");
            return Err(ProxyError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(ProxyError::UpstreamTransport)?;
        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| ProxyError::UpstreamBody(e.to_string()))?;

        debug!(reply = %value, "Received upstream reply");
        Ok(UpstreamReply(value))
    }
}
