//! `p0_gcp_access_logs`: stream Google Cloud audit logs to P0.
//!
//! A singleton component: one item per organization, addressed by the fixed
//! id [`SINGLETON_ITEM_ID`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{load, persist, Resource};
use crate::client::ApiClient;
use crate::error::ProviderError;
use crate::install::{
    decode, encode, Install, InstallState, InstallTarget, ItemModel, SINGLETON_ITEM_ID,
};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

const ACCESS_LOGS: InstallTarget = InstallTarget::new("gcp", "access-logs");

/// State of the access-logs component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcpAccessLogs {
    /// Install state reported by P0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<InstallState>,
    /// Pub/Sub topic the log sink publishes to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessLogsItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<InstallState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic_id: Option<String>,
}

impl ItemModel for GcpAccessLogs {
    fn item_id(&self) -> Option<String> {
        Some(SINGLETON_ITEM_ID.to_string())
    }

    fn from_json(_id: &str, item: &Value) -> Option<Self> {
        let wire: AccessLogsItem = decode(item)?;
        Some(Self {
            state: wire.state,
            topic_id: wire.topic_id,
        })
    }

    fn to_json(&self) -> Option<Value> {
        encode(&AccessLogsItem {
            state: self.state,
            topic_id: self.topic_id.clone(),
        })
    }

    fn install_state(&self) -> Option<InstallState> {
        self.state
    }
}

/// The `p0_gcp_access_logs` resource type.
pub struct GcpAccessLogsResource;

impl GcpAccessLogsResource {
    fn install(client: &ApiClient) -> Install<GcpAccessLogs> {
        Install::new(ACCESS_LOGS, client.clone())
    }
}

#[async_trait]
impl Resource for GcpAccessLogsResource {
    fn type_name(&self) -> &'static str {
        "p0_gcp_access_logs"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Google Cloud audit-log collection for P0")
            .with_attribute(
                "state",
                Attribute::computed_string().with_description("This item's install progress"),
            )
            .with_attribute(
                "topic_id",
                Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                    .with_description("The Pub/Sub topic that receives audit logs"),
            )
    }

    async fn create(
        &self,
        client: &ApiClient,
        planned: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let plan: GcpAccessLogs = load(planned)?;
        let install = Self::install(client);
        install.ensure_config().await?;
        let staged = install
            .stage(&plan, Some(json!({ "state": InstallState::Stage })))
            .await?;
        // Continue from the plan; only the state comes from the stage response.
        let plan = GcpAccessLogs {
            state: staged.state.or(Some(InstallState::Stage)),
            ..plan
        };
        match install.upsert_from_stage(&plan).await? {
            Some(installed) => persist(&installed).map(Some),
            None => Ok(None),
        }
    }

    async fn read(&self, client: &ApiClient, state: Value) -> Result<Option<Value>, ProviderError> {
        let state: GcpAccessLogs = load(state)?;
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
        let plan: GcpAccessLogs = load(planned)?;
        match Self::install(client).upsert_from_stage(&plan).await? {
            Some(installed) => persist(&installed).map(Some),
            None => Ok(None),
        }
    }

    async fn delete(&self, client: &ApiClient, state: Value) -> Result<(), ProviderError> {
        let state: GcpAccessLogs = load(state)?;
        Self::install(client).delete(&state).await
    }

    fn import_state(&self, _id: &str) -> Result<Value, ProviderError> {
        Ok(json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use crate::transport::Method;
    use std::sync::Arc;

    const ITEM: &str = "integrations/gcp/config/access-logs/default";

    #[tokio::test]
    async fn test_create_runs_full_install() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(200, json!({}));
        mock.respond(200, json!({"item": {"state": "stage"}}));
        mock.respond(200, json!({"item": {"state": "configure", "topicId": "p0-logs"}}));
        mock.respond(200, json!({"item": {"state": "installed", "topicId": "p0-logs"}}));

        let client = ApiClient::new(mock.clone());
        let state = GcpAccessLogsResource
            .create(&client, json!({}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state, json!({"state": "installed", "topic_id": "p0-logs"}));

        assert_eq!(
            mock.paths(),
            vec![
                "integrations/gcp/config".to_string(),
                ITEM.to_string(),
                format!("{}/verify", ITEM),
                format!("{}/configure", ITEM),
            ]
        );
        assert_eq!(mock.requests()[1].method, Method::Put);
        assert_eq!(mock.requests()[1].body, Some(json!({"state": "stage"})));
    }

    #[tokio::test]
    async fn test_create_keeps_fields_missing_from_stage_response() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(409, json!({"error": "exists"}));
        mock.respond(200, json!({"item": {"state": "stage"}}));
        mock.respond(200, json!({"item": {"state": "configure"}}));
        mock.respond(200, json!({"item": {"state": "installed", "topicId": "mine"}}));

        let client = ApiClient::new(mock.clone());
        let state = GcpAccessLogsResource
            .create(&client, json!({"topic_id": "mine"}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state["topic_id"], "mine");

        let requests = mock.requests();
        let expected = Some(json!({"state": "stage", "topicId": "mine"}));
        assert_eq!(requests[1].body, expected);
        assert_eq!(requests[2].body, expected);
        assert_eq!(requests[3].body, expected);
    }

    #[tokio::test]
    async fn test_update_upserts_from_plan() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(200, json!({"item": {"state": "installed", "topicId": "new"}}));
        mock.respond(200, json!({"item": {"state": "installed", "topicId": "new"}}));

        let client = ApiClient::new(mock.clone());
        let state = GcpAccessLogsResource
            .update(
                &client,
                json!({"state": "installed", "topic_id": "old"}),
                json!({"state": "installed", "topic_id": "new"}),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state, json!({"state": "installed", "topic_id": "new"}));

        assert_eq!(
            mock.paths(),
            vec![format!("{}/verify", ITEM), format!("{}/configure", ITEM)]
        );
        assert!(mock
            .requests()
            .iter()
            .all(|r| r.body == Some(json!({"state": "installed", "topicId": "new"}))));
    }

    #[tokio::test]
    async fn test_delete_is_hard_delete() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_raw(200, "");
        mock.respond(404, json!({"error": "Not found"}));

        let client = ApiClient::new(mock.clone());
        let state = json!({"state": "installed"});
        GcpAccessLogsResource.delete(&client, state.clone()).await.unwrap();
        GcpAccessLogsResource.delete(&client, state).await.unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests
            .iter()
            .all(|r| r.method == Method::Delete && r.path == ITEM));
    }

    #[tokio::test]
    async fn test_read_uses_sentinel_id() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(404, json!({"error": "Not found"}));

        let client = ApiClient::new(mock.clone());
        let state = GcpAccessLogsResource
            .read(&client, json!({"state": "installed"}))
            .await
            .unwrap();
        assert!(state.is_none());
        assert_eq!(mock.paths(), vec![ITEM.to_string()]);
    }
}
