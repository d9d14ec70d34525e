//! HTTP transport to the P0 API.
//!
//! [`Transport`] is the seam between the API client and the network: the
//! provider uses [`HttpTransport`], tests use
//! [`MockTransport`](crate::testing::MockTransport).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Url;
use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::config::ClientSettings;
use crate::error::ProviderError;

/// HTTP methods the P0 API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_reqwest().as_str())
    }
}

/// A request relative to the organization's API root.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the base URL, e.g. `integrations/aws/config`.
    pub path: String,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Create a request without a body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Status and undecoded body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body text.
    pub body: String,
}

impl RawResponse {
    /// Create a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Performs one HTTP round trip.
///
/// Implementations return any status the server produced as `Ok`; status
/// classification belongs to [`ApiClient`](crate::client::ApiClient).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a request.
    async fn execute(&self, request: ApiRequest) -> Result<RawResponse, ProviderError>;
}

/// [`Transport`] over `reqwest`, authenticated with a bearer token.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
    headers: HeaderMap,
}

impl HttpTransport {
    /// Build a transport from resolved settings.
    pub fn new(settings: &ClientSettings) -> Result<Self, ProviderError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", settings.token()))
            .map_err(|_| {
                ProviderError::Configuration(
                    "API token contains characters not allowed in an HTTP header".to_string(),
                )
            })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            http: reqwest::Client::new(),
            base_url: settings.base_url().clone(),
            headers,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::Validation(format!("invalid API path '{}': {}", path, e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<RawResponse, ProviderError> {
        let url = self.url(&request.path)?;
        let mut builder = self
            .http
            .request(request.method.as_reqwest(), url)
            .headers(self.headers.clone());
        if let Some(body) = &request.body {
            // Sets Content-Type: application/json
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(method = %request.method, path = %request.path, status, "P0 API request");

        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    fn settings(token: &str) -> ClientSettings {
        let config = ProviderConfig {
            org: "acme".to_string(),
            host: Some("https://api.example.test".to_string()),
        };
        ClientSettings::resolve_with_token(&config, Some(token.to_string())).unwrap()
    }

    #[test]
    fn test_transport_joins_paths_under_org() {
        let transport = HttpTransport::new(&settings("secret")).unwrap();
        let url = transport.url("integrations/aws/config/iam-write/123").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.test/o/acme/integrations/aws/config/iam-write/123"
        );
    }

    #[test]
    fn test_auth_header_is_sensitive() {
        let transport = HttpTransport::new(&settings("secret")).unwrap();
        let auth = transport.headers.get(AUTHORIZATION).unwrap();
        assert!(auth.is_sensitive());
        assert_eq!(auth.to_str().unwrap(), "Bearer secret");
        assert_eq!(transport.headers.get(ACCEPT).unwrap(), "application/json");
    }

    #[test]
    fn test_bad_token_is_configuration_error() {
        let err = HttpTransport::new(&settings("line\nbreak")).err().unwrap();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Put.to_string(), "PUT");
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }
}
