//! Error taxonomy for API clients.
//!
//! # Design
//! Configuration problems (`InvalidArgument`) fail fast and never reach the
//! network. `Call` is constructed exactly once per failed request, at
//! classification time, and carries the raw response so callers can decide
//! whether to retry. Transport failures (DNS, TCP, TLS) pass through as
//! `Transport` without an added message; the core has nothing useful to say
//! about them. A success status with an undecodable body is `Decode`, a
//! different failure than `Call` — the server answered, the payload didn't.

use thiserror::Error;

/// Errors returned by the client lifecycle and request dispatch paths.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid construction-time input, e.g. an empty host string or an
    /// unreadable CA bundle.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The server answered with a non-success status code.
    #[error("API call failed ({status}): {message}")]
    Call {
        status: u16,
        body: String,
        message: String,
    },

    /// The response body could not be converted to the expected format.
    #[error("cannot decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Transport-level failure, surfaced unmodified from the HTTP layer.
    #[error(transparent)]
    Transport(#[from] ureq::Error),
}

impl ApiError {
    /// Build a `Call` error. `message` falls back to the raw body when the
    /// client supplies no custom renderer.
    pub fn call(status: u16, body: String, message: Option<String>) -> Self {
        let message = message.unwrap_or_else(|| body.clone());
        ApiError::Call {
            status,
            body,
            message,
        }
    }

    /// HTTP status code of the failing response, if the error came from one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Call { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw text of the failing response, if the error came from one.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            ApiError::Call { body, .. } => Some(body),
            _ => None,
        }
    }
}
