pub mod error;
pub mod workflows;

use flowarden_core::{config::ApiConfig, models::RepoScope};
use http::{Method, StatusCode, header};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

pub use crate::error::ApiError;

/// Client for the remote Workflows API. Every response is expected to carry
/// the success/failure envelope; `request_raw` is the single place it is
/// decoded.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    ok: bool,
    // A null `data` decodes the same as an absent one
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// One HTTP round trip against the API. Returns the response status and
    /// the envelope's `data` slot; a 204 carries no data and is the only
    /// response that skips envelope decoding. Every failure path, transport
    /// errors included, yields an `ApiError`.
    pub(crate) async fn request_raw(
        &self,
        method: Method,
        path: &str,
        scope: RepoScope,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Option<Value>), ApiError> {
        let url = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        tracing::debug!("{} {}", method, url);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("x-installation-id", scope.installation_id.to_string())
            .header("x-repository-id", scope.repository_id.to_string())
            .header(header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(ApiError::transport)?;

        let status = response.status();
        // DELETE responds 204 No Content
        if status == StatusCode::NO_CONTENT {
            return Ok((status, None));
        }

        // Decode the body as an envelope regardless of the declared content
        // type, some servers forget the header
        let text = response.text().await.map_err(ApiError::transport)?;
        let envelope = serde_json::from_str::<RawEnvelope>(&text).ok();

        if !status.is_success() {
            if let Some(RawEnvelope { ok: false, error: Some(error), .. }) = envelope {
                return Err(envelope_error(error, status));
            }
            return Err(ApiError {
                message: format!("API request failed: {} {}", method, path),
                status: Some(status),
                details: (!text.is_empty()).then(|| Value::from(text)),
            });
        }
        match envelope {
            Some(RawEnvelope { ok: true, data, .. }) => Ok((status, data)),
            Some(RawEnvelope { ok: false, error: Some(error), .. }) => {
                Err(envelope_error(error, status))
            }
            Some(RawEnvelope { ok: false, error: None, .. }) => Err(ApiError {
                message: format!("API request failed: {} {}", method, path),
                status: Some(status),
                details: None,
            }),
            None => Err(ApiError {
                message: "Expected JSON response but received non-JSON".to_string(),
                status: Some(status),
                details: (!text.is_empty()).then(|| Value::from(text)),
            }),
        }
    }

    pub(crate) async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        scope: RepoScope,
        body: Option<&Value>,
    ) -> Result<T, ApiError> {
        let (status, data) = self.request_raw(method.clone(), path, scope, body).await?;
        let Some(data) = data else {
            return Err(ApiError {
                message: format!("API request failed: {} {}", method, path),
                status: Some(status),
                details: None,
            });
        };
        serde_json::from_value(data).map_err(|err| ApiError {
            message: format!("Failed to decode API response: {err}"),
            status: Some(status),
            details: None,
        })
    }
}

fn envelope_error(error: ErrorBody, status: StatusCode) -> ApiError {
    let message = error.message.clone();
    let details = serde_json::to_value(error).ok();
    ApiError { message, status: Some(status), details }
}
