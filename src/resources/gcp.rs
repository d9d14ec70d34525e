//! `p0_gcp`: connect a Google Cloud organization to P0.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{load, persist, Resource};
use crate::client::ApiClient;
use crate::error::ProviderError;
use crate::install::{decode, encode, RootInstall, RootModel};
use crate::schema::{Attribute, Schema};

const INTEGRATION: &str = "gcp";

/// State of the Google Cloud integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcpOrganization {
    /// Google Cloud organization id.
    pub organization_id: String,
    /// Service account P0 acts as, reported by P0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_email: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcpItem {
    organization_id: String,
    #[serde(default, skip_serializing)]
    service_account_email: Option<String>,
}

impl RootModel for GcpOrganization {
    fn from_json(item: &Value) -> Option<Self> {
        let wire: GcpItem = decode(item)?;
        Some(Self {
            organization_id: wire.organization_id,
            service_account_email: wire.service_account_email,
        })
    }

    fn to_json(&self) -> Option<Value> {
        encode(&GcpItem {
            organization_id: self.organization_id.clone(),
            service_account_email: None,
        })
    }
}

/// The `p0_gcp` resource type.
pub struct GcpResource;

impl GcpResource {
    fn install(client: &ApiClient) -> RootInstall<GcpOrganization> {
        RootInstall::new(INTEGRATION, client.clone())
    }
}

#[async_trait]
impl Resource for GcpResource {
    fn type_name(&self) -> &'static str {
        "p0_gcp"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A Google Cloud organization connected to P0")
            .with_attribute(
                "organization_id",
                Attribute::required_string()
                    .with_description("The Google Cloud organization ID")
                    .with_force_new(),
            )
            .with_attribute(
                "service_account_email",
                Attribute::computed_string()
                    .with_description("The service account P0 uses in this organization"),
            )
    }

    async fn create(
        &self,
        client: &ApiClient,
        planned: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let plan: GcpOrganization = load(planned)?;
        let created = Self::install(client).create(&plan).await?;
        persist(&created).map(Some)
    }

    async fn read(&self, client: &ApiClient, state: Value) -> Result<Option<Value>, ProviderError> {
        let state: GcpOrganization = load(state)?;
        let current = Self::install(client).read(&state).await?;
        persist(&current).map(Some)
    }

    async fn update(
        &self,
        _client: &ApiClient,
        _prior: Value,
        _planned: Value,
    ) -> Result<Option<Value>, ProviderError> {
        Err(ProviderError::Unimplemented(
            "p0_gcp has no updatable attributes; changes require replacement".to_string(),
        ))
    }

    async fn delete(&self, client: &ApiClient, state: Value) -> Result<(), ProviderError> {
        let state: GcpOrganization = load(state)?;
        Self::install(client).delete(&state).await
    }

    fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        Ok(serde_json::json!({ "organization_id": id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_service_account_is_read_only() {
        let model = GcpOrganization {
            organization_id: "698375260981".to_string(),
            service_account_email: Some("p0@example.iam.gserviceaccount.com".to_string()),
        };
        assert_eq!(model.to_json().unwrap(), json!({"organizationId": "698375260981"}));
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let mock = Arc::new(MockTransport::new());
        let item = json!({"item": {
            "organizationId": "698375260981",
            "serviceAccountEmail": "p0@example.iam.gserviceaccount.com"
        }});
        mock.respond(200, item.clone());
        mock.respond(200, item);

        let client = ApiClient::new(mock.clone());
        let created = GcpResource
            .create(&client, json!({"organization_id": "698375260981"}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created["service_account_email"], "p0@example.iam.gserviceaccount.com");

        let read = GcpResource.read(&client, created.clone()).await.unwrap();
        assert_eq!(read, Some(created));
        assert_eq!(mock.paths(), vec!["integrations/gcp/config", "integrations/gcp/config"]);
    }

    #[tokio::test]
    async fn test_update_is_rejected() {
        let mock = Arc::new(MockTransport::new());
        let client = ApiClient::new(mock.clone());
        let err = GcpResource
            .update(&client, json!({}), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unimplemented(_)));
        assert!(mock.requests().is_empty());
    }
}
