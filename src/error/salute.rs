use reqwest::StatusCode;
use thiserror::Error as ThisError;

use super::IsRetryable;
use crate::salute::Operation;

#[derive(Debug, ThisError)]
pub enum SaluteError {
    /// Transport-level failure (DNS, connect, timeouts, body read, etc).
    #[error("HTTP request error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend rejected the bearer token (expired or invalid).
    #[error("[{op}] Unauthorized: body={body:.200}")]
    Unauthorized { op: Operation, body: String },

    /// Non-2xx response outside the auth class.
    #[error("[{op}] Upstream error: status={status}, body={body:.200}")]
    Upstream {
        op: Operation,
        status: StatusCode,
        body: String,
    },

    /// Response body was not the JSON document the operation expects.
    #[error("[{op}] Unexpected response payload: {message}")]
    UnexpectedPayload { op: Operation, message: String },

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Token endpoint returned an unusable expiry: {0}")]
    InvalidExpiry(i64),

    #[error("Token endpoint returned an empty access token")]
    EmptyAccessToken,

    #[error("Handler not started")]
    NotStarted,

    #[error("Handler stopped")]
    Stopped,

    #[error("Audio merge failed: {0}")]
    Merge(String),
}

impl SaluteError {
    pub fn is_auth(&self) -> bool {
        matches!(self, SaluteError::Unauthorized { .. })
    }

    /// Transient transport failures: connect errors and timeouts only.
    pub fn is_transient(&self) -> bool {
        match self {
            SaluteError::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

impl IsRetryable for SaluteError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}
