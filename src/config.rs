//! Provider configuration.
//!
//! The provider block supplies the organization and an optional API host;
//! the API token comes from the `P0_API_TOKEN` environment variable so it
//! never lands in configuration files or state.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Environment variable holding the P0 API token.
pub const TOKEN_ENV_VAR: &str = "P0_API_TOKEN";

/// Host used when the configuration does not override it.
pub const DEFAULT_HOST: &str = "https://api.p0.app";

/// The provider block as written by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// P0 organization identifier.
    pub org: String,
    /// API host override, e.g. for a self-hosted deployment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl ProviderConfig {
    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Configures access to a P0 organization")
            .with_attribute(
                "org",
                Attribute::required_string().with_description("Your P0 organization identifier"),
            )
            .with_attribute(
                "host",
                Attribute::optional_string()
                    .with_description(format!("P0 API host (defaults to {})", DEFAULT_HOST)),
            )
    }

    /// Parse the provider block from its JSON form.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        serde_json::from_value(value)
            .map_err(|e| ProviderError::Configuration(format!("invalid provider block: {}", e)))
    }
}

/// Resolved, validated connection settings shared by every request.
#[derive(Clone)]
pub struct ClientSettings {
    base_url: Url,
    token: String,
}

impl ClientSettings {
    /// Resolve settings, reading the token from [`TOKEN_ENV_VAR`].
    pub fn resolve(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Self::resolve_with_token(config, std::env::var(TOKEN_ENV_VAR).ok())
    }

    /// Resolve settings with an explicitly supplied token.
    pub fn resolve_with_token(
        config: &ProviderConfig,
        token: Option<String>,
    ) -> Result<Self, ProviderError> {
        let org = config.org.trim();
        if org.is_empty() {
            return Err(ProviderError::Configuration(
                "'org' must not be empty".to_string(),
            ));
        }
        if org.contains('/') {
            return Err(ProviderError::Configuration(format!(
                "'org' must not contain '/': {}",
                org
            )));
        }

        let host = config.host.as_deref().unwrap_or(DEFAULT_HOST);
        let host_url = Url::parse(host)
            .map_err(|e| ProviderError::Configuration(format!("invalid host '{}': {}", host, e)))?;
        if !matches!(host_url.scheme(), "http" | "https") {
            return Err(ProviderError::Configuration(format!(
                "host must use http or https: {}",
                host
            )));
        }

        let base = format!("{}/o/{}/", host.trim_end_matches('/'), org);
        let base_url = Url::parse(&base)
            .map_err(|e| ProviderError::Configuration(format!("invalid base URL '{}': {}", base, e)))?;

        let token = token.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
            ProviderError::Configuration(format!(
                "missing API token; set the {} environment variable",
                TOKEN_ENV_VAR
            ))
        })?;

        Ok(Self { base_url, token })
    }

    /// Base URL for the organization, ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// API token.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}
