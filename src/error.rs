//! Error types for the P0 provider.

use thiserror::Error;

use crate::install::InstallState;
use crate::schema::Diagnostic;

/// HTTP status the backend uses to signal a missing item.
pub const STATUS_NOT_FOUND: u16 = 404;

/// HTTP status the backend uses to signal an item that already exists.
pub const STATUS_CONFLICT: u16 = 409;

/// Errors that can occur while talking to P0 or converting its payloads.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request never produced an HTTP response.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with an error status or an `error` envelope.
    #[error("P0 API error ({status}): {message}")]
    Api {
        /// HTTP status of the response.
        status: u16,
        /// Message reported by the backend, or the status reason.
        message: String,
    },

    /// The backend returned a payload that breaks its own response contract.
    #[error("Backend contract violation: {0}")]
    Contract(String),

    /// A payload could not be converted to or from the resource model.
    #[error("{summary}")]
    Conversion {
        /// Short title for the failure.
        summary: String,
        /// Pretty-printed payload that failed conversion.
        detail: String,
    },

    /// The item identifier could not be extracted from state.
    #[error("Missing item identifier")]
    MissingIdentifier {
        /// Pretty-printed state the identifier was looked up in.
        detail: String,
    },

    /// The backend reported an install state the item cannot move to.
    #[error("Invalid install state transition from '{from}' to '{to}'")]
    InvalidTransition {
        /// State before the operation.
        from: InstallState,
        /// State reported by the backend.
        to: InstallState,
    },

    /// Operation not implemented for this resource type.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

impl ProviderError {
    /// Build an API error from a status and message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Build a conversion error carrying the pretty-printed payload.
    pub fn conversion(summary: impl Into<String>, payload: &serde_json::Value) -> Self {
        Self::Conversion {
            summary: summary.into(),
            detail: pretty(payload),
        }
    }

    /// Build an identifier error carrying the pretty-printed state.
    pub fn missing_identifier(state: &serde_json::Value) -> Self {
        Self::MissingIdentifier {
            detail: pretty(state),
        }
    }

    /// HTTP status attached to this error, if the backend answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the backend answered 404.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(STATUS_NOT_FOUND)
    }

    /// Whether the backend answered 409.
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(STATUS_CONFLICT)
    }

    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::Contract(msg)
            | Self::Unimplemented(msg) => msg,
            Self::Api { message, .. } => message,
            Self::Conversion { summary, .. } => summary,
            Self::MissingIdentifier { .. } => "missing item identifier",
            Self::Serialization(_) => "serialization error (see Debug output)",
            Self::Network(_) => "network error (see Debug output)",
            Self::InvalidTransition { .. } => "invalid install state transition",
        }
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Api { status, message } => {
                Diagnostic::error("Error communicating with P0")
                    .with_detail(format!("HTTP {}: {}", status, message))
            },
            ProviderError::Network(err) => Diagnostic::error("Error communicating with P0")
                .with_detail(format!("Could not reach the P0 API: {}", err)),
            ProviderError::Contract(msg) => {
                Diagnostic::error("Unexpected response from P0").with_detail(msg)
            },
            ProviderError::Conversion { summary, detail } => {
                Diagnostic::error(summary).with_detail(detail)
            },
            ProviderError::MissingIdentifier { detail } => {
                Diagnostic::error("Could not determine item identifier").with_detail(format!(
                    "No identifier could be extracted from state:\n{}",
                    detail
                ))
            },
            ProviderError::InvalidTransition { from, to } => {
                Diagnostic::error("Invalid install state").with_detail(format!(
                    "P0 reported state '{}' for an item in state '{}'",
                    to, from
                ))
            },
            ProviderError::Configuration(msg) => {
                Diagnostic::error("Invalid provider configuration").with_detail(msg)
            },
            other => Diagnostic::error(other.to_string()),
        }
    }
}

pub(crate) fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;
    use serde_json::json;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("resource-123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: resource-123");

        let err = ProviderError::api(403, "forbidden");
        assert_eq!(format!("{}", err), "P0 API error (403): forbidden");

        let err = ProviderError::UnknownResource("p0_custom".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: p0_custom");
    }

    #[test]
    fn test_status_classification() {
        assert!(ProviderError::api(404, "gone").is_not_found());
        assert!(ProviderError::api(409, "exists").is_conflict());
        assert!(!ProviderError::api(500, "boom").is_not_found());
        assert_eq!(ProviderError::Validation("x".into()).status(), None);
    }

    #[test]
    fn test_conversion_diagnostic_carries_payload() {
        let err = ProviderError::conversion(
            "Could not convert item",
            &json!({"roleName": "P0RoleIamManager", "state": 7}),
        );
        let diag: Diagnostic = err.into();

        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert_eq!(diag.summary, "Could not convert item");
        let detail = diag.detail.unwrap();
        assert!(detail.contains("\"roleName\""));
        assert!(detail.contains("\"state\""));
    }

    #[test]
    fn test_missing_identifier_diagnostic() {
        let diag: Diagnostic = ProviderError::missing_identifier(&json!({"label": "prod"})).into();
        assert_eq!(diag.summary, "Could not determine item identifier");
        assert!(diag.detail.unwrap().contains("\"label\""));
    }

    #[test]
    fn test_transition_diagnostic() {
        let err = ProviderError::InvalidTransition {
            from: InstallState::Installed,
            to: InstallState::Configure,
        };
        assert_eq!(
            err.to_string(),
            "Invalid install state transition from 'installed' to 'configure'"
        );
        let diag: Diagnostic = err.into();
        assert!(diag.detail.unwrap().contains("'configure'"));
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::Configuration("missing org".to_string());
        assert_eq!(err.message(), "missing org");

        let err = ProviderError::api(500, "internal");
        assert_eq!(err.message(), "internal");
    }
}
