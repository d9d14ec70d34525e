//! Install state of a component item.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProviderError;

/// Where an item sits in its installation.
///
/// The ordering is meaningful: `Stage < Configure < Installed`. P0 owns the
/// authoritative value; the provider only checks that what P0 reports is a
/// move the item can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallState {
    /// Item exists; out-of-band setup may still be pending.
    Stage,
    /// Item passed verification and is being configured.
    Configure,
    /// Item is fully installed.
    Installed,
}

/// The kind of operation that produced a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Stage, verify, or configure.
    Advance,
    /// Return an item to stage without deleting it.
    Rollback,
}

impl InstallState {
    /// All states, in install order.
    pub const ALL: [InstallState; 3] = [Self::Stage, Self::Configure, Self::Installed];

    /// Wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stage => "stage",
            Self::Configure => "configure",
            Self::Installed => "installed",
        }
    }

    /// Whether `self -> next` is allowed for the given kind of operation.
    ///
    /// Advancing never moves backwards (repeating the current state is fine);
    /// rolling back always lands on `Stage`.
    pub fn can_transition_to(&self, next: InstallState, kind: Transition) -> bool {
        match kind {
            Transition::Advance => next >= *self,
            Transition::Rollback => next == Self::Stage,
        }
    }

    /// Check a transition, returning the new state when allowed.
    pub fn transition(
        &self,
        next: InstallState,
        kind: Transition,
    ) -> Result<InstallState, ProviderError> {
        if self.can_transition_to(next, kind) {
            Ok(next)
        } else {
            Err(ProviderError::InvalidTransition {
                from: *self,
                to: next,
            })
        }
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallState {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ProviderError::Contract(format!("unknown install state '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(InstallState::Stage < InstallState::Configure);
        assert!(InstallState::Configure < InstallState::Installed);
    }

    #[test]
    fn test_advance_is_monotonic() {
        for from in InstallState::ALL {
            for to in InstallState::ALL {
                assert_eq!(
                    from.can_transition_to(to, Transition::Advance),
                    to >= from,
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_rollback_only_lands_on_stage() {
        for from in InstallState::ALL {
            assert!(from.can_transition_to(InstallState::Stage, Transition::Rollback));
            assert!(!from.can_transition_to(InstallState::Installed, Transition::Rollback));
        }
    }

    #[test]
    fn test_transition_error() {
        let err = InstallState::Installed
            .transition(InstallState::Stage, Transition::Advance)
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::InvalidTransition {
                from: InstallState::Installed,
                to: InstallState::Stage
            }
        ));
    }

    #[test]
    fn test_parse_and_serde() {
        assert_eq!("configure".parse::<InstallState>().unwrap(), InstallState::Configure);
        assert!("done".parse::<InstallState>().is_err());

        let json = serde_json::to_value(InstallState::Installed).unwrap();
        assert_eq!(json, serde_json::json!("installed"));
        let back: InstallState = serde_json::from_value(serde_json::json!("stage")).unwrap();
        assert_eq!(back, InstallState::Stage);
    }
}
