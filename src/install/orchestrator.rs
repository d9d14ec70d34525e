//! Install orchestrator for components addressed by an item id.
//!
//! Items live at `integrations/<integration>/config/<component>/<id>`.

use serde_json::{json, Value};
use std::marker::PhantomData;
use tracing::{debug, info, instrument};

use super::model::{deep_merge, merge_object, ItemModel};
use super::state::Transition;
use crate::client::ApiClient;
use crate::error::ProviderError;

/// Steps posted by [`Install::upsert_from_stage`], in the order P0 requires.
pub const INSTALL_STEPS: [&str; 2] = ["verify", "configure"];

/// Item id used by components that hold exactly one item.
pub const SINGLETON_ITEM_ID: &str = "default";

/// Which component of which integration an orchestrator drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallTarget {
    /// Integration key, e.g. `aws`.
    pub integration: &'static str,
    /// Component key, e.g. `iam-write`.
    pub component: &'static str,
}

impl InstallTarget {
    /// Create a target.
    pub const fn new(integration: &'static str, component: &'static str) -> Self {
        Self {
            integration,
            component,
        }
    }

    /// `integrations/<integration>/config`
    pub fn config_path(&self) -> String {
        format!("integrations/{}/config", self.integration)
    }

    /// `integrations/<integration>/config/<component>/<id>`
    pub fn item_path(&self, id: &str) -> String {
        format!("{}/{}/{}", self.config_path(), self.component, id)
    }
}

/// Install orchestrator for one component, generic over its state model.
pub struct Install<M> {
    target: InstallTarget,
    client: ApiClient,
    _model: PhantomData<fn() -> M>,
}

impl<M: ItemModel> Install<M> {
    /// Create an orchestrator for `target`.
    pub fn new(target: InstallTarget, client: ApiClient) -> Self {
        Self {
            target,
            client,
            _model: PhantomData,
        }
    }

    /// The component this orchestrator drives.
    pub fn target(&self) -> InstallTarget {
        self.target
    }

    /// Create the integration container if it does not exist yet.
    ///
    /// A 409 means it already exists and counts as success.
    #[instrument(skip(self), fields(integration = self.target.integration))]
    pub async fn ensure_config(&self) -> Result<(), ProviderError> {
        let path = self.target.config_path();
        match self.client.post::<_, Value>(&path, &json!({})).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_conflict() => {
                debug!("Integration config already exists");
                Ok(())
            },
            Err(e) => Err(e),
        }
    }

    /// PUT the planned item (merged with `extra`) and return the staged state.
    #[instrument(
        skip_all,
        fields(integration = self.target.integration, component = self.target.component)
    )]
    pub async fn stage(&self, plan: &M, extra: Option<Value>) -> Result<M, ProviderError> {
        let id = item_id(plan)?;
        let body = merge_object(item_json(plan)?, extra);

        let response = self
            .client
            .put::<_, Value>(&self.target.item_path(&id), &body)
            .await?;
        let staged = from_response::<M>(&id, &response.value)?;
        info!(id = %id, state = ?staged.install_state(), "Item staged");
        Ok(staged)
    }

    /// Run every install step against a staged item.
    ///
    /// Steps run strictly in [`INSTALL_STEPS`] order, and each response is
    /// merged into the ones before it. A 404 from any step means the item was
    /// deleted outside the provider: the remaining steps are skipped and
    /// `None` is returned. Steps that already ran are not undone when a later
    /// step fails.
    #[instrument(
        skip_all,
        fields(integration = self.target.integration, component = self.target.component)
    )]
    pub async fn upsert_from_stage(&self, plan: &M) -> Result<Option<M>, ProviderError> {
        let id = item_id(plan)?;
        let body = item_json(plan)?;
        let path = self.target.item_path(&id);

        let mut response = Value::Null;
        for step in INSTALL_STEPS {
            match self
                .client
                .post::<_, Value>(&format!("{}/{}", path, step), &body)
                .await
            {
                Ok(r) => {
                    debug!(id = %id, step, "Install step completed");
                    deep_merge(&mut response, r.value);
                },
                Err(e) if e.is_not_found() => {
                    info!(id = %id, step, "Item no longer exists; removing from state");
                    return Ok(None);
                },
                Err(e) => return Err(e),
            }
        }

        let installed = from_response::<M>(&id, &response)?;
        check_transition(plan, &installed, Transition::Advance)?;
        info!(id = %id, state = ?installed.install_state(), "Item installed");
        Ok(Some(installed))
    }

    /// Fetch the item; `None` if P0 no longer has it.
    #[instrument(
        skip_all,
        fields(integration = self.target.integration, component = self.target.component)
    )]
    pub async fn read(&self, state: &M) -> Result<Option<M>, ProviderError> {
        let id = item_id(state)?;
        match self.client.get::<Value>(&self.target.item_path(&id)).await {
            Ok(response) => from_response::<M>(&id, &response.value).map(Some),
            Err(e) if e.is_not_found() => {
                info!(id = %id, "Item not found; removing from state");
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    /// Return an installed item to `stage` without deleting it.
    ///
    /// Used instead of [`delete`](Self::delete) when a staged resource still
    /// depends on the item.
    #[instrument(
        skip_all,
        fields(integration = self.target.integration, component = self.target.component)
    )]
    pub async fn rollback(&self, state: &M) -> Result<(), ProviderError> {
        let id = item_id(state)?;
        let body = item_json(state)?;
        let response = self
            .client
            .put::<_, Value>(&self.target.item_path(&id), &body)
            .await?;

        // An empty body is accepted; anything else must be a convertible item.
        if !response.value.is_null() {
            let rolled_back = from_response::<M>(&id, &response.value)?;
            check_transition(state, &rolled_back, Transition::Rollback)?;
        }
        info!(id = %id, "Item rolled back to stage");
        Ok(())
    }

    /// Delete the item. A 404 means it is already gone.
    #[instrument(
        skip_all,
        fields(integration = self.target.integration, component = self.target.component)
    )]
    pub async fn delete(&self, state: &M) -> Result<(), ProviderError> {
        let id = item_id(state)?;
        match self.client.delete(&self.target.item_path(&id)).await {
            Ok(_) => {
                info!(id = %id, "Item deleted");
                Ok(())
            },
            Err(e) if e.is_not_found() => {
                debug!(id = %id, "Item already deleted");
                Ok(())
            },
            Err(e) => Err(e),
        }
    }
}

fn item_id<M: ItemModel>(model: &M) -> Result<String, ProviderError> {
    model
        .item_id()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProviderError::missing_identifier(&state_json(model)))
}

fn item_json<M: ItemModel>(model: &M) -> Result<Value, ProviderError> {
    model.to_json().ok_or_else(|| {
        ProviderError::conversion("Could not convert state to a P0 item", &state_json(model))
    })
}

fn from_response<M: ItemModel>(id: &str, response: &Value) -> Result<M, ProviderError> {
    let item = M::item_json(response).ok_or_else(|| {
        ProviderError::conversion("P0 response did not contain an item", response)
    })?;
    M::from_json(id, &item)
        .ok_or_else(|| ProviderError::conversion("Could not convert P0 item to state", &item))
}

fn check_transition<M: ItemModel>(
    before: &M,
    after: &M,
    kind: Transition,
) -> Result<(), ProviderError> {
    match (before.install_state(), after.install_state()) {
        (Some(from), Some(to)) => from.transition(to, kind).map(|_| ()),
        _ => Ok(()),
    }
}

fn state_json<M: ItemModel>(model: &M) -> Value {
    serde_json::to_value(model).unwrap_or(Value::Null)
}
