//! The proxy service behind `POST /api/chat`.
//!
//! Each call flattens the submitted turns into one prompt, forwards it to the
//! upstream service and normalizes whatever comes back into a
//! [`ProxyResponse`]. Nothing is kept between calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{HistoryPolicy, ProxyConfig};
use crate::constants::{FALLBACK_CODE, FALLBACK_QUESTIONS};
use crate::conversation::{flatten_prompt, ConversationTurn};
use crate::error::ProxyError;
use crate::upstream::{UpstreamClient, UpstreamReply, UpstreamRequest};

/// Body of `POST /api/chat`. A body without `messages` is an empty conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ConversationTurn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub questions: Vec<String>,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct ChatProxy {
    upstream: UpstreamClient,
    history_policy: HistoryPolicy,
}

impl ChatProxy {
    pub fn new(config: &ProxyConfig) -> Result<Self, ProxyError> {
        Ok(Self {
            upstream: UpstreamClient::new(config)?,
            history_policy: config.history_policy,
        })
    }

    pub async fn handle(&self, turns: &[ConversationTurn]) -> Result<ProxyResponse, ProxyError> {
        let request = build_upstream_request(turns, self.history_policy);
        info!(
            upstream = self.upstream.url(),
            turns = turns.len(),
            prompt_len = request.message.len(),
            "Forwarding conversation upstream"
        );
        let reply = self.upstream.send(&request).await?;
        Ok(normalize_reply(&reply))
    }
}

pub fn build_upstream_request(turns: &[ConversationTurn], policy: HistoryPolicy) -> UpstreamRequest {
    let history = match policy {
        HistoryPolicy::Empty => Vec::new(),
        HistoryPolicy::Forward => match turns.split_last() {
            Some((_, prior)) => prior.to_vec(),
            None => Vec::new(),
        },
    };
    UpstreamRequest {
        message: flatten_prompt(turns),
        history,
    }
}

/// Substitutes the fixed defaults for missing or falsy fields.
pub fn normalize_reply(reply: &UpstreamReply) -> ProxyResponse {
    let questions = match reply.field("questions") {
        Some(Value::Array(items)) => items.iter().map(value_text).collect(),
        other => {
            debug!(questions = ?other, "Upstream sent no usable questions, using defaults");
            fallback_questions()
        }
    };

    let code = match reply.field("code") {
        Some(value) if !is_falsy(value) => value_text(value),
        other => {
            debug!(code = ?other, "Upstream sent no code, using placeholder");
            FALLBACK_CODE.to_string()
        }
    };

    ProxyResponse { questions, code }
}

pub fn fallback_questions() -> Vec<String> {
    FALLBACK_QUESTIONS.iter().map(|q| q.to_string()).collect()
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
