//! `p0_aws_iam_write_staged`: stage an AWS account for IAM management.
//!
//! Staging makes P0 generate the IAM role the account must trust. The role
//! name and trust policy come back as response metadata; the user creates the
//! role out of band and then declares `p0_aws_iam_write` to finish the
//! install.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{load, persist, Resource};
use crate::client::ApiClient;
use crate::error::ProviderError;
use crate::install::{decode, encode, Install, InstallState, InstallTarget, ItemModel};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

pub(super) const IAM_WRITE: InstallTarget = InstallTarget::new("aws", "iam-write");

/// State of a staged AWS account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsIamWriteStaged {
    /// AWS account id.
    #[serde(default)]
    pub id: String,
    /// Display label for the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Install state reported by P0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<InstallState>,
    /// Role P0 expects to find in the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<AwsRole>,
}

/// IAM role generated by P0 for a staged account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsRole {
    /// Role name.
    pub name: String,
    /// Trust policy document, as JSON text.
    pub trust_policy: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StagedItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<InstallState>,
    #[serde(default, skip_serializing)]
    metadata: Option<StagedMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StagedMetadata {
    role_name: String,
    trust_policy: Value,
}

impl ItemModel for AwsIamWriteStaged {
    fn item_id(&self) -> Option<String> {
        Some(self.id.clone())
    }

    /// Folds response metadata into the item so the role is part of state.
    fn item_json(response: &Value) -> Option<Value> {
        let mut item = response.get("item")?.as_object()?.clone();
        if let Some(metadata) = response.get("metadata").filter(|m| !m.is_null()) {
            item.insert("metadata".to_string(), metadata.clone());
        }
        Some(Value::Object(item))
    }

    fn from_json(id: &str, item: &Value) -> Option<Self> {
        let wire: StagedItem = decode(item)?;
        let role = match wire.metadata {
            Some(metadata) => Some(AwsRole {
                name: metadata.role_name,
                trust_policy: match metadata.trust_policy {
                    Value::String(text) => text,
                    document => serde_json::to_string(&document).ok()?,
                },
            }),
            None => None,
        };
        Some(Self {
            id: id.to_string(),
            label: wire.label,
            state: wire.state,
            role,
        })
    }

    fn to_json(&self) -> Option<Value> {
        encode(&StagedItem {
            label: self.label.clone(),
            state: self.state,
            metadata: None,
        })
    }

    fn install_state(&self) -> Option<InstallState> {
        self.state
    }
}

/// The `p0_aws_iam_write_staged` resource type.
pub struct AwsIamWriteStagedResource;

impl AwsIamWriteStagedResource {
    fn install(client: &ApiClient) -> Install<AwsIamWriteStaged> {
        Install::new(IAM_WRITE, client.clone())
    }
}

#[async_trait]
impl Resource for AwsIamWriteStagedResource {
    fn type_name(&self) -> &'static str {
        "p0_aws_iam_write_staged"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A staged AWS account, before its P0 role exists")
            .with_attribute(
                "id",
                Attribute::required_string()
                    .with_description("The AWS account ID")
                    .with_force_new(),
            )
            .with_attribute(
                "label",
                Attribute::optional_string().with_description("The AWS account's alias"),
            )
            .with_attribute(
                "state",
                Attribute::computed_string().with_description("This item's install progress"),
            )
            .with_attribute(
                "role",
                Attribute::new(
                    AttributeType::object([
                        ("name", AttributeType::String),
                        ("trust_policy", AttributeType::String),
                    ]),
                    AttributeFlags::computed(),
                )
                .with_description("The IAM role P0 uses to manage this account"),
            )
    }

    async fn create(
        &self,
        client: &ApiClient,
        planned: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let plan: AwsIamWriteStaged = load(planned)?;
        let install = Self::install(client);
        install.ensure_config().await?;
        let staged = install.stage(&plan, None).await?;
        persist(&staged).map(Some)
    }

    async fn read(&self, client: &ApiClient, state: Value) -> Result<Option<Value>, ProviderError> {
        let state: AwsIamWriteStaged = load(state)?;
        match Self::install(client).read(&state).await? {
            Some(item) => persist(&item).map(Some),
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        client: &ApiClient,
        _prior: Value,
        planned: Value,
    ) -> Result<Option<Value>, ProviderError> {
        // Only the label can change in place; re-staging records it.
        let plan: AwsIamWriteStaged = load(planned)?;
        let staged = Self::install(client).stage(&plan, None).await?;
        persist(&staged).map(Some)
    }

    async fn delete(&self, client: &ApiClient, state: Value) -> Result<(), ProviderError> {
        let state: AwsIamWriteStaged = load(state)?;
        Self::install(client).delete(&state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use crate::transport::Method;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_item_json_folds_metadata() {
        let response = json!({
            "item": {"label": "prod", "state": "stage"},
            "metadata": {"roleName": "P0RoleIamManager", "trustPolicy": {"Version": "2012-10-17"}}
        });
        let item = AwsIamWriteStaged::item_json(&response).unwrap();
        let model = AwsIamWriteStaged::from_json("123456789012", &item).unwrap();

        let role = model.role.unwrap();
        assert_eq!(role.name, "P0RoleIamManager");
        assert_eq!(role.trust_policy, r#"{"Version":"2012-10-17"}"#);
        assert_eq!(model.state, Some(InstallState::Stage));
    }

    #[test]
    fn test_to_json_never_sends_role() {
        let model = AwsIamWriteStaged {
            id: "123456789012".to_string(),
            label: Some("prod".to_string()),
            state: None,
            role: Some(AwsRole {
                name: "r".to_string(),
                trust_policy: "{}".to_string(),
            }),
        };
        assert_eq!(model.to_json().unwrap(), json!({"label": "prod"}));
    }

    #[test]
    fn test_round_trip() {
        let model = AwsIamWriteStaged {
            id: "123456789012".to_string(),
            label: None,
            state: Some(InstallState::Stage),
            role: None,
        };
        let json = model.to_json().unwrap();
        let back = AwsIamWriteStaged::from_json("123456789012", &json).unwrap();
        assert_eq!(back.to_json().unwrap(), json);
        assert_eq!(back.label, None);
    }

    #[tokio::test]
    async fn test_create_ensures_config_then_stages() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(409, json!({"error": "exists"}));
        mock.respond(
            200,
            json!({
                "item": {"state": "stage"},
                "metadata": {"roleName": "P0RoleIamManager", "trustPolicy": "{}"}
            }),
        );

        let client = ApiClient::new(mock.clone());
        let state = AwsIamWriteStagedResource
            .create(&client, json!({"id": "123456789012"}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state["state"], "stage");
        assert_eq!(state["role"]["name"], "P0RoleIamManager");

        let requests = mock.requests();
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].path, "integrations/aws/config");
        assert_eq!(requests[1].method, Method::Put);
        assert_eq!(requests[1].path, "integrations/aws/config/iam-write/123456789012");
    }

    #[tokio::test]
    async fn test_delete_is_hard_delete() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_raw(200, "");
        let client = ApiClient::new(mock.clone());
        AwsIamWriteStagedResource
            .delete(&client, json!({"id": "123456789012", "state": "stage"}))
            .await
            .unwrap();
        assert_eq!(mock.requests()[0].method, Method::Delete);
    }
}
