//! The P0 provider: dispatches service calls to resource implementations.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, error, info, instrument, warn};

use crate::client::ApiClient;
use crate::config::{ClientSettings, ProviderConfig};
use crate::error::ProviderError;
use crate::resources::{self, Resource};
use crate::schema::{Diagnostic, ProviderSchema, Schema};
use crate::service::ProviderService;
use crate::types::{AttributeChange, ImportedResource, PlanResult};
use crate::validation::validate;

/// Provider for P0 integrations.
///
/// The API client is built once by [`configure`](ProviderService::configure)
/// and shared, read-only, by every later call.
pub struct P0Provider {
    resources: HashMap<&'static str, Box<dyn Resource>>,
    client: OnceLock<ApiClient>,
}

impl P0Provider {
    /// Create an unconfigured provider offering every resource type.
    pub fn new() -> Self {
        Self {
            resources: resources::all()
                .into_iter()
                .map(|r| (r.type_name(), r))
                .collect(),
            client: OnceLock::new(),
        }
    }

    /// Create a provider that is already configured with `client`.
    pub fn with_client(client: ApiClient) -> Self {
        let provider = Self::new();
        let _ = provider.client.set(client);
        provider
    }

    /// Configure from already resolved settings.
    pub fn configure_with_settings(&self, settings: &ClientSettings) -> Result<(), ProviderError> {
        let client = ApiClient::from_settings(settings)?;
        self.client.set(client).map_err(|_| {
            ProviderError::Configuration("provider is already configured".to_string())
        })?;
        info!(base_url = %settings.base_url(), "Provider configured");
        Ok(())
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn Resource, ProviderError> {
        self.resources
            .get(resource_type)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn client(&self) -> Result<&ApiClient, ProviderError> {
        self.client.get().ok_or_else(|| {
            ProviderError::Configuration("provider has not been configured".to_string())
        })
    }
}

impl Default for P0Provider {
    fn default() -> Self {
        Self::new()
    }
}

/// Plan `proposed` against `prior` under `schema`.
///
/// Computed attributes the proposal leaves unset keep their prior value,
/// unless a `force_new` attribute changed and the resource is replaced.
fn plan_changes(schema: &Schema, prior: Option<&Value>, proposed: Value) -> PlanResult {
    let requires_replace = prior.is_some_and(|prior| {
        schema
            .force_new_attributes()
            .any(|name| present(prior, name) != present(&proposed, name))
    });

    let mut planned = proposed;
    if let (Some(prior), false, Value::Object(obj)) = (prior, requires_replace, &mut planned) {
        for name in schema.computed_attributes() {
            if let Some(value) = present(prior, name).filter(|_| present_in(obj, name).is_none()) {
                obj.insert(name.to_string(), value.clone());
            }
        }
    }

    let changes = AttributeChange::diff(prior, &planned);
    PlanResult::with_changes(planned, changes, requires_replace)
}

fn present<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    value.get(name).filter(|v| !v.is_null())
}

fn present_in<'a>(obj: &'a serde_json::Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).filter(|v| !v.is_null())
}

#[async_trait]
impl ProviderService for P0Provider {
    fn schema(&self) -> ProviderSchema {
        self.resources.values().fold(
            ProviderSchema::new().with_provider_config(ProviderConfig::schema()),
            |schema, r| schema.with_resource(r.type_name(), r.schema()),
        )
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&ProviderConfig::schema(), &config))
    }

    #[instrument(skip_all, name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validate(&ProviderConfig::schema(), &config);
        if diagnostics.iter().any(Diagnostic::is_error) {
            warn!(diagnostics = diagnostics.len(), "Provider configuration is invalid");
            return Ok(diagnostics);
        }

        let config = ProviderConfig::from_value(config)?;
        let settings = ClientSettings::resolve(&config)?;
        self.configure_with_settings(&settings)?;
        Ok(diagnostics)
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        Ok(validate(&resource.schema(), &config))
    }

    #[instrument(skip(self, state), name = "provider.upgrade_resource_state")]
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: u64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let upgraded = self.resource(resource_type)?.upgrader().upgrade(version, state)?;
        debug!("State upgraded");
        Ok(upgraded)
    }

    #[instrument(skip(self, prior_state, proposed_state), name = "provider.plan")]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        if proposed_state.is_null() {
            let changes = AttributeChange::diff(prior_state.as_ref(), &Value::Null);
            return Ok(PlanResult::with_changes(Value::Null, changes, false));
        }

        let plan = plan_changes(&resource.schema(), prior_state.as_ref(), proposed_state);
        info!(
            changes = plan.changes.len(),
            requires_replace = plan.requires_replace,
            "Plan completed"
        );
        Ok(plan)
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let result = self
            .resource(resource_type)?
            .create(self.client()?, planned_state)
            .await;
        match &result {
            Ok(Some(_)) => info!("Create completed successfully"),
            Ok(None) => warn!("Item disappeared during create"),
            Err(e) => error!(error = %e, "Create failed"),
        }
        result
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let result = self
            .resource(resource_type)?
            .read(self.client()?, current_state)
            .await;
        if let Err(e) = &result {
            error!(error = %e, "Read failed");
        }
        result
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let result = self
            .resource(resource_type)?
            .update(self.client()?, prior_state, planned_state)
            .await;
        match &result {
            Ok(_) => info!("Update completed successfully"),
            Err(e) => error!(error = %e, "Update failed"),
        }
        result
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let result = self
            .resource(resource_type)?
            .delete(self.client()?, current_state)
            .await;
        match &result {
            Ok(()) => info!("Delete completed successfully"),
            Err(e) => error!(error = %e, "Delete failed"),
        }
        result
    }

    #[instrument(skip(self), name = "provider.import_resource")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let state = resource.import_state(id)?;
        match resource.read(self.client()?, state).await? {
            Some(state) => Ok(vec![ImportedResource::new(resource_type, state)]),
            None => Err(ProviderError::NotFound(format!(
                "{} with id '{}' does not exist in P0",
                resource_type, id
            ))),
        }
    }
}
