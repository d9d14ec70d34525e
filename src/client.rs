//! JSON client for the P0 API.
//!
//! Wraps a [`Transport`] with JSON encoding and a single error channel: a
//! response fails when its status is 400 or above, or when its body carries a
//! non-null `"error"` key. A non-string `"error"` is reported as a contract
//! violation rather than ignored.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::config::ClientSettings;
use crate::error::ProviderError;
use crate::transport::{ApiRequest, HttpTransport, Method, RawResponse, Transport};

/// A successfully decoded response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    /// HTTP status code.
    pub status: u16,
    /// Decoded body.
    pub value: T,
}

/// Client for one P0 organization. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    /// Create a client over an arbitrary transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Create a client that talks HTTP to the configured host.
    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ProviderError> {
        Ok(Self::new(Arc::new(HttpTransport::new(settings)?)))
    }

    /// GET `path`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<ApiResponse<T>, ProviderError> {
        self.send(ApiRequest::new(Method::Get, path)).await
    }

    /// POST `body` to `path`.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>, ProviderError> {
        let body = serde_json::to_value(body)?;
        self.send(ApiRequest::new(Method::Post, path).with_body(body))
            .await
    }

    /// PUT `body` to `path`.
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>, ProviderError> {
        let body = serde_json::to_value(body)?;
        self.send(ApiRequest::new(Method::Put, path).with_body(body))
            .await
    }

    /// DELETE `path`, returning the response status.
    pub async fn delete(&self, path: &str) -> Result<u16, ProviderError> {
        let response: ApiResponse<Value> = self.send(ApiRequest::new(Method::Delete, path)).await?;
        Ok(response.status)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<ApiResponse<T>, ProviderError> {
        let method = request.method;
        let path = request.path.clone();
        let raw = self.transport.execute(request).await?;

        let envelope = classify(&raw).inspect_err(|e| {
            warn!(method = %method, path = %path, status = raw.status, error = %e, "P0 API request failed");
        })?;

        Ok(ApiResponse {
            status: raw.status,
            value: serde_json::from_value(envelope)?,
        })
    }
}

/// Decode a raw response and apply the error rules.
fn classify(raw: &RawResponse) -> Result<Value, ProviderError> {
    let failed = raw.status >= 400;

    let body = if raw.body.trim().is_empty() {
        Value::Null
    } else {
        match serde_json::from_str::<Value>(&raw.body) {
            Ok(value) => value,
            // Keep the status visible so 404/409 handling still works.
            Err(_) if failed => return Err(ProviderError::api(raw.status, raw.body.trim())),
            Err(e) => return Err(e.into()),
        }
    };

    let reported = match body.get("error") {
        None | Some(Value::Null) => None,
        Some(Value::String(message)) => Some(message.clone()),
        Some(other) if failed => Some(other.to_string()),
        Some(other) => {
            return Err(ProviderError::Contract(format!(
                "\"error\" must be a string, got {}",
                other
            )))
        },
    };

    match reported {
        Some(message) => Err(ProviderError::api(raw.status, message)),
        None if failed => Err(ProviderError::api(raw.status, status_reason(raw.status))),
        None => Ok(body),
    }
}

fn status_reason(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("request failed")
        .to_string()
}
