//! Resource types offered by the provider.
//!
//! Each resource pairs a schema with a state model that implements the
//! install conversion contract, and maps the provider lifecycle onto one of
//! the install orchestrators:
//!
//! | Resource                   | Create                   | Delete   |
//! |----------------------------|--------------------------|----------|
//! | `p0_aws_iam_write_staged`  | ensure config + stage    | delete   |
//! | `p0_aws_iam_write`         | upsert from stage        | rollback |
//! | `p0_gcp`                   | root create              | delete   |
//! | `p0_gcp_access_logs`       | ensure + stage + upsert  | delete   |

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::client::ApiClient;
use crate::error::ProviderError;
use crate::migration::StateUpgrader;
use crate::schema::Schema;

mod aws_iam_write;
mod aws_iam_write_staged;
mod gcp;
mod gcp_access_logs;

pub use aws_iam_write::{AwsIamWrite, AwsIamWriteResource, AwsLogin};
pub use aws_iam_write_staged::{AwsIamWriteStaged, AwsIamWriteStagedResource, AwsRole};
pub use gcp::{GcpOrganization, GcpResource};
pub use gcp_access_logs::{GcpAccessLogs, GcpAccessLogsResource};

/// A resource type: schema plus lifecycle against the P0 API.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name, e.g. `p0_aws_iam_write`.
    fn type_name(&self) -> &'static str;

    /// Schema of the resource state.
    fn schema(&self) -> Schema;

    /// Upgrades from older schema versions to [`schema`](Self::schema)'s.
    fn upgrader(&self) -> StateUpgrader {
        StateUpgrader::new()
    }

    /// Create the resource. `None` means P0 dropped the item mid-install.
    async fn create(&self, client: &ApiClient, planned: Value)
        -> Result<Option<Value>, ProviderError>;

    /// Refresh state. `None` means the item is gone.
    async fn read(&self, client: &ApiClient, state: Value) -> Result<Option<Value>, ProviderError>;

    /// Apply an in-place update.
    async fn update(
        &self,
        client: &ApiClient,
        prior: Value,
        planned: Value,
    ) -> Result<Option<Value>, ProviderError>;

    /// Remove the resource.
    async fn delete(&self, client: &ApiClient, state: Value) -> Result<(), ProviderError>;

    /// State to read after importing `id`.
    fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        Ok(json!({ "id": id }))
    }
}

/// Every resource type the provider offers.
pub fn all() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(AwsIamWriteStagedResource),
        Box::new(AwsIamWriteResource),
        Box::new(GcpResource),
        Box::new(GcpAccessLogsResource),
    ]
}

/// Load a plan or state object into its model.
pub(crate) fn load<M: DeserializeOwned>(value: Value) -> Result<M, ProviderError> {
    serde_json::from_value(value.clone())
        .map_err(|_| ProviderError::conversion("Could not read resource state", &value))
}

/// Render a model as a state object.
pub(crate) fn persist<M: Serialize>(model: &M) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(model)?)
}
