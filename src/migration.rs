//! Versioned state upgrades.
//!
//! A resource whose schema changed shape registers one upgrade function per
//! version bump. State written at version `n` is passed through every step
//! from `n` up to the current version, in order.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ProviderError;

/// Upgrades state from one version to the next.
pub type UpgradeFn = fn(Map<String, Value>) -> Result<Map<String, Value>, ProviderError>;

/// Ordered chain of single-version upgrades.
///
/// Step `i` upgrades version `i` to `i + 1`, so the current schema version
/// is the number of steps.
#[derive(Debug, Clone, Default)]
pub struct StateUpgrader {
    steps: Vec<UpgradeFn>,
}

impl StateUpgrader {
    /// A chain with no steps (version 0).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the upgrade from the current version to the next.
    pub fn then(mut self, step: UpgradeFn) -> Self {
        self.steps.push(step);
        self
    }

    /// The schema version state ends up at.
    pub fn current_version(&self) -> u64 {
        self.steps.len() as u64
    }

    /// Upgrade `state` written at `version` to the current version.
    pub fn upgrade(&self, version: u64, state: Value) -> Result<Value, ProviderError> {
        let current = self.current_version();
        if version > current {
            return Err(ProviderError::Validation(format!(
                "state was written at schema version {}, newer than this provider's version {}",
                version, current
            )));
        }

        let mut obj = match state {
            Value::Object(obj) => obj,
            other => {
                return Err(ProviderError::Validation(format!(
                    "state to upgrade must be an object, got {}",
                    other
                )))
            },
        };

        for (from, step) in self.steps.iter().enumerate().skip(version as usize) {
            debug!(from, to = from + 1, "Upgrading resource state");
            obj = step(obj)?;
        }
        Ok(Value::Object(obj))
    }
}

/// Move `from` to `to`, leaving state untouched when `from` is absent.
pub fn rename_field(obj: &mut Map<String, Value>, from: &str, to: &str) {
    if let Some(value) = obj.remove(from) {
        obj.insert(to.to_string(), value);
    }
}
