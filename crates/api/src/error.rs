use std::{error::Error, fmt};

use http::StatusCode;
use serde_json::Value;

/// The one error type every API operation returns. Carries the HTTP status
/// when a response was received (`None` means the request never produced
/// one), plus the server's structured error body when the failure envelope
/// included it.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub message: String,
    pub status: Option<StatusCode>,
    pub details: Option<Value>,
}

impl ApiError {
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        Self { message: err.to_string(), status: err.status(), details: None }
    }

    pub(crate) fn encode(err: serde_json::Error) -> Self {
        Self {
            message: format!("Failed to encode request body: {err}"),
            status: None,
            details: None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.message) }
}

impl Error for ApiError {}
