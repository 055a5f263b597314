//! Build run results and fatal setup errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::module::{BuildState, ModuleError};

/// Preconditions that make a whole run meaningless.
///
/// Raised once, before the first module is touched.
#[derive(Debug, Error)]
pub enum SetupError {
  #[error("failed to create directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("{path} is not writable: {source}")]
  NotWritable {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Why a module ended up unbuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoisonCause {
  /// The recovery policy gave up on the module.
  Abandoned { state: BuildState, error: ModuleError },
  /// A dependency was already poisoned when the module was reached.
  Dependency { dependency: String },
  /// The policy asked to resume at a state this module does not have.
  UnsupportedState { state: BuildState },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStatus {
  Built,
  Poisoned(PoisonCause),
}

/// What happened to one module during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOutcome {
  pub name: String,
  /// Every state entered, in order, including retries.
  pub states: Vec<BuildState>,
  /// Errors the policy chose to move past.
  pub accepted_errors: Vec<ModuleError>,
  pub status: ModuleStatus,
}

impl ModuleOutcome {
  pub fn is_poisoned(&self) -> bool {
    matches!(self.status, ModuleStatus::Poisoned(_))
  }
}

/// Result of [`BuildDriver::build`](super::BuildDriver::build), one outcome per
/// module in plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
  pub outcomes: Vec<ModuleOutcome>,
}

impl BuildReport {
  pub fn succeeded(&self) -> bool {
    !self.outcomes.iter().any(ModuleOutcome::is_poisoned)
  }

  /// Names of unbuilt modules, in plan order.
  pub fn poisoned(&self) -> Vec<&str> {
    self
      .outcomes
      .iter()
      .filter(|o| o.is_poisoned())
      .map(|o| o.name.as_str())
      .collect()
  }

  pub fn outcome(&self, name: &str) -> Option<&ModuleOutcome> {
    self.outcomes.iter().find(|o| o.name == name)
  }
}

impl std::fmt::Display for PoisonCause {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      PoisonCause::Abandoned { state, error } => write!(f, "abandoned during {}: {}", state, error),
      PoisonCause::Dependency { dependency } => write!(f, "dependency {} was not built", dependency),
      PoisonCause::UnsupportedState { state } => write!(f, "no {} stage", state),
    }
  }
}
