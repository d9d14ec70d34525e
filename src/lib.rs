//! P0 Provider
//!
//! A provider that installs P0 integrations into an organization.
//!
//! # Overview
//!
//! Most integrations are installed in phases. An item is first **staged**
//! (P0 records it and reports what the user must set up on their side),
//! then walked through **verify** and **configure** until it is
//! **installed**. Each phase is a separate resource type, so the out-of-band
//! setup can sit between them:
//!
//! - `p0_aws_iam_write_staged` stages an AWS account and exposes the IAM role
//!   it must trust
//! - `p0_aws_iam_write` finishes the install once the role exists
//! - `p0_gcp` connects a Google Cloud organization
//! - `p0_gcp_access_logs` installs audit-log collection for that organization
//!
//! The crate provides:
//!
//! - **ProviderService trait**: the operations a plugin host calls
//! - **P0Provider**: the implementation dispatching to resources
//! - **Install orchestrators**: [`install::Install`] and [`install::RootInstall`]
//! - **API client**: [`ApiClient`] over a pluggable [`transport::Transport`]
//! - **Schema and validation**: attribute schemas and config checking
//! - **State migration**: versioned upgrades of stored state
//! - **Logging**: integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```ignore
//! use p0_provider::{init_logging, P0Provider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     // The API token is read from P0_API_TOKEN.
//!     let provider = P0Provider::new();
//!     provider.configure(json!({"org": "acme"})).await?;
//!
//!     let staged = provider
//!         .create("p0_aws_iam_write_staged", json!({"id": "123456789012"}))
//!         .await?;
//!     tracing::info!(?staged, "Account staged");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod install;
pub mod logging;
pub mod migration;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod service;
pub mod testing;
pub mod transport;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::ApiClient;
pub use config::{ClientSettings, ProviderConfig};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::P0Provider;
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
