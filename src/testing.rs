//! Testing utilities for the provider.
//!
//! [`MockTransport`] scripts P0 API responses and records every request, so
//! resources and the install orchestrator can be exercised without a network.
//! [`ProviderTester`] drives a [`ProviderService`] the way a plugin host would.
//!
//! # Example
//!
//! ```ignore
//! use p0_provider::testing::{MockTransport, ProviderTester};
//! use p0_provider::{ApiClient, P0Provider};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::test]
//! async fn test_read_item() {
//!     let mock = Arc::new(MockTransport::new());
//!     mock.respond(200, json!({"item": {"state": "installed"}}));
//!
//!     let tester = ProviderTester::new(P0Provider::with_client(ApiClient::new(mock.clone())));
//!     let state = tester
//!         .read("p0_aws_iam_write", json!({"id": "123456789012"}))
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(state.unwrap()["state"], "installed");
//!     assert_eq!(mock.paths(), vec!["integrations/aws/config/iam-write/123456789012"]);
//! }
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::ProviderError;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::service::ProviderService;
use crate::transport::{ApiRequest, RawResponse, Transport};
use crate::types::{ImportedResource, PlanResult};

// =========================================================================
// Mock Transport
// =========================================================================

/// A [`Transport`] that replays scripted responses in order.
///
/// Requests are recorded before a response is popped, so a request that
/// found no scripted response still shows up in [`requests`](Self::requests).
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    responses: VecDeque<RawResponse>,
    requests: Vec<ApiRequest>,
}

impl MockTransport {
    /// Create a transport with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON response.
    pub fn respond(&self, status: u16, body: Value) {
        self.respond_raw(status, &body.to_string());
    }

    /// Queue a response with a literal body.
    pub fn respond_raw(&self, status: u16, body: &str) {
        self.state().responses.push_back(RawResponse::new(status, body));
    }

    /// Every request executed so far.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state().requests.clone()
    }

    /// Paths of every request executed so far.
    pub fn paths(&self) -> Vec<String> {
        self.state().requests.iter().map(|r| r.path.clone()).collect()
    }

    /// Number of scripted responses not yet consumed.
    pub fn pending(&self) -> usize {
        self.state().responses.len()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: ApiRequest) -> Result<RawResponse, ProviderError> {
        let mut state = self.state();
        let description = format!("{} {}", request.method, request.path);
        state.requests.push(request);
        state.responses.pop_front().ok_or_else(|| {
            ProviderError::Unimplemented(format!("no scripted response for {}", description))
        })
    }
}

// =========================================================================
// Provider Tester
// =========================================================================

/// A test harness for provider implementations.
///
/// Wraps a `ProviderService` and offers the calls a host makes, plus
/// lifecycle helpers that chain plan and apply the way a host would.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration.
    ///
    /// Returns `Err` with the diagnostics if there are errors.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider.
    ///
    /// Returns `Err` with the diagnostics if there are errors.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider.plan(resource_type, None, proposed_state).await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), proposed_state)
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Upgrade resource state from an older schema version.
    pub async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: u64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .upgrade_resource_state(resource_type, version, state)
            .await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Run a full create lifecycle: plan → create.
    ///
    /// An item that vanished during the apply is reported as `NotFound`.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan_result.planned_state).await?;
        present(resource_type, "create", created)
    }

    /// Run a full update lifecycle: plan → update.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan_result.planned_state)
            .await?;
        present(resource_type, "update", updated)
    }

    /// Run a full delete lifecycle: plan → delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let _ = self
            .plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }
}

fn present(resource_type: &str, op: &str, state: Option<Value>) -> Result<Value, ProviderError> {
    state.ok_or_else(|| {
        ProviderError::NotFound(format!("{} disappeared during {}", resource_type, op))
    })
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

/// Diagnostics a host would show for `result`.
pub fn diagnostics_of<T>(result: Result<T, ProviderError>) -> Vec<Diagnostic> {
    match result {
        Ok(_) => Vec::new(),
        Err(e) => vec![e.into()],
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan result indicates the resource will be created.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(!plan.requires_replace, "Expected plan to create, not replace");
}

/// Assert that a plan result indicates no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan requires resource replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan does not require resource replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that a plan has a change for a specific attribute.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes_attribute(path),
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(Diagnostic::is_error),
        "Expected at least one error, but got none"
    );
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error) && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Schema};
    use crate::transport::Method;
    use crate::types::AttributeChange;
    use serde_json::json;

    // Echoes states back, so the tester can be checked on its own.
    struct EchoProvider;

    #[async_trait]
    impl ProviderService for EchoProvider {
        fn schema(&self) -> ProviderSchema {
            ProviderSchema::new().with_resource(
                "echo",
                Schema::v0().with_attribute("name", Attribute::required_string()),
            )
        }

        async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
            if config.get("fail").is_some() {
                return Ok(vec![Diagnostic::error("Bad config").with_attribute("fail")]);
            }
            Ok(vec![Diagnostic::warning("Deprecated setting")])
        }

        async fn plan(
            &self,
            _resource_type: &str,
            prior_state: Option<Value>,
            proposed_state: Value,
        ) -> Result<PlanResult, ProviderError> {
            let changes = AttributeChange::diff(prior_state.as_ref(), &proposed_state);
            Ok(PlanResult::with_changes(proposed_state, changes, false))
        }

        async fn create(
            &self,
            _resource_type: &str,
            planned_state: Value,
        ) -> Result<Option<Value>, ProviderError> {
            Ok(Some(planned_state))
        }

        async fn read(
            &self,
            _resource_type: &str,
            _current_state: Value,
        ) -> Result<Option<Value>, ProviderError> {
            Ok(None)
        }

        async fn update(
            &self,
            _resource_type: &str,
            _prior_state: Value,
            _planned_state: Value,
        ) -> Result<Option<Value>, ProviderError> {
            Ok(None)
        }

        async fn delete(
            &self,
            _resource_type: &str,
            _current_state: Value,
        ) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_mock_replays_in_order() {
        let mock = MockTransport::new();
        mock.respond(200, json!({"a": 1}));
        mock.respond_raw(404, "");

        let first = mock
            .execute(ApiRequest::new(Method::Get, "one"))
            .await
            .unwrap();
        assert_eq!(first, RawResponse::new(200, r#"{"a":1}"#));

        let second = mock
            .execute(ApiRequest::new(Method::Delete, "two"))
            .await
            .unwrap();
        assert_eq!(second.status, 404);
        assert_eq!(mock.pending(), 0);
        assert_eq!(mock.paths(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_mock_without_script_records_request() {
        let mock = MockTransport::new();
        let err = mock
            .execute(ApiRequest::new(Method::Post, "integrations/aws/config").with_body(json!({})))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("POST integrations/aws/config"));
        assert_eq!(mock.requests()[0].body, Some(json!({})));
    }

    #[tokio::test]
    async fn test_tester_configure() {
        let tester = ProviderTester::new(EchoProvider);
        assert!(tester.configure(json!({})).await.is_ok());

        match tester.configure(json!({"fail": true})).await {
            Err(TestError::Diagnostics(diags)) => assert_eq!(diags.len(), 1),
            other => panic!("expected diagnostics, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tester_plans() {
        let tester = ProviderTester::new(EchoProvider);
        let plan = tester.plan_create("echo", json!({"name": "a"})).await.unwrap();
        assert_plan_creates(&plan);
        assert_plan_changes_attribute(&plan, "name");

        let state = json!({"name": "a"});
        let plan = tester.plan_update("echo", state.clone(), state).await.unwrap();
        assert_plan_no_changes(&plan);
        assert_plan_updates_in_place(&plan);
    }

    #[tokio::test]
    async fn test_lifecycle_reports_vanished_item() {
        let tester = ProviderTester::new(EchoProvider);
        let created = tester
            .lifecycle_create("echo", json!({"name": "a"}))
            .await
            .unwrap();
        assert_eq!(created["name"], "a");

        let err = tester
            .lifecycle_update("echo", created, json!({"name": "b"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[test]
    fn test_diagnostics_of() {
        assert!(diagnostics_of(Ok::<_, ProviderError>(())).is_empty());

        let diagnostics = diagnostics_of::<()>(Err(ProviderError::api(500, "boom")));
        assert_has_errors(&diagnostics);
        assert_error_contains(&diagnostics, "Error communicating with P0");
    }

    #[test]
    #[should_panic(expected = "Expected no errors")]
    fn test_assert_no_errors_fails() {
        assert_no_errors(&[Diagnostic::error("An error")]);
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("First error").with_attribute("field1"),
            Diagnostic::error("Second error").with_detail("More info"),
        ]);

        let display = format!("{}", err);
        assert!(display.contains("First error"));
        assert!(display.contains("field1"));
        assert!(display.contains("More info"));
    }
}
