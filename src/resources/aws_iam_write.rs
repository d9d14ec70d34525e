//! `p0_aws_iam_write`: finish installing a staged AWS account.
//!
//! Runs verify and configure against an item created by
//! `p0_aws_iam_write_staged`. Destroying this resource rolls the item back
//! to `stage` so the staged resource keeps seeing it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::aws_iam_write_staged::IAM_WRITE;
use super::{load, persist, Resource};
use crate::client::ApiClient;
use crate::error::ProviderError;
use crate::install::{decode, encode, Install, InstallState, ItemModel};
use crate::migration::{rename_field, StateUpgrader};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

const DEFAULT_PARTITION: &str = "aws";

/// State of an installed AWS account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsIamWrite {
    /// AWS account id.
    #[serde(default)]
    pub id: String,
    /// Display label for the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Install state reported by P0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<InstallState>,
    /// AWS partition of the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    /// How users sign in to the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<AwsLogin>,
}

/// Sign-in method for an AWS account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsLogin {
    /// One of `iam`, `idc`, or `federated`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Identity provider name, for federated and IDC logins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_provider: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstalledItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<InstallState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    partition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    login: Option<LoginItem>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identity_provider: Option<String>,
}

impl ItemModel for AwsIamWrite {
    fn item_id(&self) -> Option<String> {
        Some(self.id.clone())
    }

    fn from_json(id: &str, item: &Value) -> Option<Self> {
        let wire: InstalledItem = decode(item)?;
        Some(Self {
            id: id.to_string(),
            label: wire.label,
            state: wire.state,
            partition: wire.partition,
            login: wire.login.map(|login| AwsLogin {
                kind: login.kind,
                identity_provider: login.identity_provider,
            }),
        })
    }

    fn to_json(&self) -> Option<Value> {
        encode(&InstalledItem {
            label: self.label.clone(),
            state: self.state,
            partition: self.partition.clone(),
            login: self.login.as_ref().map(|login| LoginItem {
                kind: login.kind.clone(),
                identity_provider: login.identity_provider.clone(),
            }),
        })
    }

    fn install_state(&self) -> Option<InstallState> {
        self.state
    }
}

/// v0 kept login settings as two flat attributes.
fn nest_login(mut obj: Map<String, Value>) -> Result<Map<String, Value>, ProviderError> {
    let kind = obj.remove("login_type").filter(|v| !v.is_null());
    let provider = obj.remove("login_identity_provider").filter(|v| !v.is_null());
    if let Some(kind) = kind {
        let mut login = json!({ "type": kind });
        if let Some(provider) = provider {
            login["identity_provider"] = provider;
        }
        obj.insert("login".to_string(), login);
    }
    Ok(obj)
}

/// v1 had no partition and a `display_name` in place of `label`.
fn add_partition(mut obj: Map<String, Value>) -> Result<Map<String, Value>, ProviderError> {
    rename_field(&mut obj, "display_name", "label");
    obj.entry("partition")
        .and_modify(|p| {
            if p.is_null() {
                *p = json!(DEFAULT_PARTITION);
            }
        })
        .or_insert_with(|| json!(DEFAULT_PARTITION));
    Ok(obj)
}

/// The `p0_aws_iam_write` resource type.
pub struct AwsIamWriteResource;

impl AwsIamWriteResource {
    fn install(client: &ApiClient) -> Install<AwsIamWrite> {
        Install::new(IAM_WRITE, client.clone())
    }

    async fn upsert(
        &self,
        client: &ApiClient,
        planned: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let plan: AwsIamWrite = load(planned)?;
        match Self::install(client).upsert_from_stage(&plan).await? {
            Some(installed) => persist(&installed).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Resource for AwsIamWriteResource {
    fn type_name(&self) -> &'static str {
        "p0_aws_iam_write"
    }

    fn schema(&self) -> Schema {
        Schema::new(2)
            .with_description("An AWS account installed for P0 IAM management")
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
                "partition",
                Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                    .with_description("The AWS partition (defaults to 'aws')"),
            )
            .with_attribute(
                "login",
                Attribute::new(
                    AttributeType::object([
                        ("type", AttributeType::String),
                        ("identity_provider", AttributeType::String),
                    ]),
                    AttributeFlags::optional(),
                )
                .with_description("How users sign in to this account"),
            )
    }

    fn upgrader(&self) -> StateUpgrader {
        StateUpgrader::new().then(nest_login).then(add_partition)
    }

    async fn create(
        &self,
        client: &ApiClient,
        planned: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.upsert(client, planned).await
    }

    async fn read(&self, client: &ApiClient, state: Value) -> Result<Option<Value>, ProviderError> {
        let state: AwsIamWrite = load(state)?;
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
        self.upsert(client, planned).await
    }

    async fn delete(&self, client: &ApiClient, state: Value) -> Result<(), ProviderError> {
        let state: AwsIamWrite = load(state)?;
        Self::install(client).rollback(&state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use crate::transport::Method;
    use std::sync::Arc;

    const PATH: &str = "integrations/aws/config/iam-write/123456789012";

    #[test]
    fn test_upgrade_from_v0() {
        let v0 = json!({
            "id": "123456789012",
            "display_name": "prod",
            "state": "installed",
            "login_type": "federated",
            "login_identity_provider": "okta"
        });
        let upgraded = AwsIamWriteResource.upgrader().upgrade(0, v0).unwrap();
        assert_eq!(
            upgraded,
            json!({
                "id": "123456789012",
                "label": "prod",
                "state": "installed",
                "partition": "aws",
                "login": {"type": "federated", "identity_provider": "okta"}
            })
        );
        assert!(load::<AwsIamWrite>(upgraded).is_ok());
    }

    #[test]
    fn test_upgrade_from_v1_keeps_partition() {
        let v1 = json!({"id": "1", "partition": "aws-us-gov"});
        let upgraded = AwsIamWriteResource.upgrader().upgrade(1, v1).unwrap();
        assert_eq!(upgraded["partition"], "aws-us-gov");

        let v1 = json!({"id": "1", "partition": null});
        let upgraded = AwsIamWriteResource.upgrader().upgrade(1, v1).unwrap();
        assert_eq!(upgraded["partition"], "aws");
    }

    #[test]
    fn test_wire_uses_camel_case() {
        let model = AwsIamWrite {
            id: "123456789012".to_string(),
            label: None,
            state: None,
            partition: None,
            login: Some(AwsLogin {
                kind: "idc".to_string(),
                identity_provider: Some("sso".to_string()),
            }),
        };
        assert_eq!(
            model.to_json().unwrap(),
            json!({"login": {"type": "idc", "identityProvider": "sso"}})
        );
    }

    #[tokio::test]
    async fn test_delete_rolls_back() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(200, json!({"item": {"state": "stage"}}));

        let client = ApiClient::new(mock.clone());
        AwsIamWriteResource
            .delete(&client, json!({"id": "123456789012", "state": "installed"}))
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Put);
        assert_eq!(requests[0].path, PATH);
        assert_eq!(requests[0].body, Some(json!({"state": "installed"})));
    }

    #[tokio::test]
    async fn test_create_removed_mid_install() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(404, json!({"error": "Not found"}));

        let client = ApiClient::new(mock.clone());
        let state = AwsIamWriteResource
            .create(&client, json!({"id": "123456789012"}))
            .await
            .unwrap();
        assert!(state.is_none());
        assert_eq!(mock.paths(), vec![format!("{}/verify", PATH)]);
    }
}
