//! Install orchestrator for integrations configured by a single object.

use serde_json::Value;
use std::marker::PhantomData;
use tracing::{info, instrument};

use super::model::RootModel;
use crate::client::ApiClient;
use crate::error::ProviderError;

/// Orchestrator for integrations with a single configuration object.
///
/// There is no item id and no staging: the object lives at
/// `integrations/<integration>/config`, and a missing object is always an
/// error.
pub struct RootInstall<M> {
    integration: &'static str,
    client: ApiClient,
    _model: PhantomData<fn() -> M>,
}

impl<M: RootModel> RootInstall<M> {
    /// Create an orchestrator for `integration`.
    pub fn new(integration: &'static str, client: ApiClient) -> Self {
        Self {
            integration,
            client,
            _model: PhantomData,
        }
    }

    fn path(&self) -> String {
        format!("integrations/{}/config", self.integration)
    }

    /// POST the planned configuration.
    #[instrument(skip_all, fields(integration = self.integration))]
    pub async fn create(&self, plan: &M) -> Result<M, ProviderError> {
        let body = plan.to_json().ok_or_else(|| {
            ProviderError::conversion(
                "Could not convert state to a P0 configuration",
                &serde_json::to_value(plan).unwrap_or(Value::Null),
            )
        })?;
        let response = self.client.post::<_, Value>(&self.path(), &body).await?;
        let created = from_response::<M>(&response.value)?;
        info!("Integration configured");
        Ok(created)
    }

    /// GET the configuration.
    #[instrument(skip_all, fields(integration = self.integration))]
    pub async fn read(&self, _state: &M) -> Result<M, ProviderError> {
        let response = self.client.get::<Value>(&self.path()).await?;
        from_response::<M>(&response.value)
    }

    /// DELETE the configuration.
    #[instrument(skip_all, fields(integration = self.integration))]
    pub async fn delete(&self, _state: &M) -> Result<(), ProviderError> {
        self.client.delete(&self.path()).await?;
        info!("Integration configuration deleted");
        Ok(())
    }
}

fn from_response<M: RootModel>(response: &Value) -> Result<M, ProviderError> {
    let item = M::item_json(response).ok_or_else(|| {
        ProviderError::conversion("P0 response did not contain a configuration", response)
    })?;
    M::from_json(&item).ok_or_else(|| {
        ProviderError::conversion("Could not convert P0 configuration to state", &item)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::{decode, encode};
    use crate::testing::MockTransport;
    use crate::transport::Method;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Org {
        organization_id: String,
    }

    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct OrgWire {
        organization_id: String,
    }

    impl RootModel for Org {
        fn from_json(item: &Value) -> Option<Self> {
            let wire: OrgWire = decode(item)?;
            Some(Self {
                organization_id: wire.organization_id,
            })
        }

        fn to_json(&self) -> Option<Value> {
            encode(&OrgWire {
                organization_id: self.organization_id.clone(),
            })
        }
    }

    fn org() -> Org {
        Org {
            organization_id: "698375260981".to_string(),
        }
    }

    fn root(mock: &Arc<MockTransport>) -> RootInstall<Org> {
        RootInstall::new("gcp", ApiClient::new(mock.clone()))
    }

    #[tokio::test]
    async fn test_create_posts_config() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(200, json!({"item": {"organizationId": "698375260981"}}));

        let created = root(&mock).create(&org()).await.unwrap();
        assert_eq!(created, org());

        let request = &mock.requests()[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, "integrations/gcp/config");
        assert_eq!(request.body, Some(json!({"organizationId": "698375260981"})));
    }

    #[tokio::test]
    async fn test_read_404_is_an_error() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(404, json!({"error": "Not found"}));
        let err = root(&mock).read(&org()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_read_bad_payload() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(200, json!({"item": {"orgId": 1}}));
        let err = root(&mock).read(&org()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Conversion { .. }));
    }

    #[tokio::test]
    async fn test_delete() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_raw(200, "");
        mock.respond(404, json!({"error": "Not found"}));

        let root = root(&mock);
        root.delete(&org()).await.unwrap();
        assert!(root.delete(&org()).await.unwrap_err().is_not_found());
        assert_eq!(mock.requests()[0].method, Method::Delete);
    }
}
