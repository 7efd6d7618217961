//! Error types for the proxy endpoint and the client controller.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::constants::UNKNOWN_ERROR;

/// JSON body of every non-2xx answer from the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let error = if message.trim().is_empty() {
            UNKNOWN_ERROR.to_string()
        } else {
            message
        };
        Self { error }
    }
}

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("failed to reach upstream service: {0}")]
    UpstreamTransport(#[source] reqwest::Error),

    #[error("upstream service returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("upstream service returned an unreadable body: {0}")]
    UpstreamBody(String),

    #[error("{0}")]
    Rejected(#[from] JsonRejection),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Rejected(rejection) => rejection.status(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "chat request failed");
        }
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("failed to reach proxy: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("proxy returned {status}: {error}")]
    Status { status: u16, error: String },

    #[error("could not decode proxy response: {0}")]
    Decode(String),

    #[error("a request is already in flight")]
    Busy,

    #[error("prompt must not be empty")]
    EmptyPrompt,

    #[error("session is not ready for {0}")]
    NotReady(&'static str),
}
