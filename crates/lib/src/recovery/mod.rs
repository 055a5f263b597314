//! Error recovery policies.
//!
//! When a state reports an error the driver asks a [`RecoveryPolicy`] what to
//! do. The policy sees a [`Failure`] and answers with a [`Decision`]: resume at
//! some state, or poison the module. Interactive and unattended policies share
//! the same menu of [`MenuChoice`]s:
//!
//! 1. rerun the failing stage
//! 2. ignore the error and continue to the proposed next stage
//! 3. give up on the module
//! 4. start a shell in the build directory, then ask again
//! 5. and up: go to one of the module's alternate stages

mod console;

use std::collections::VecDeque;
use std::path::Path;

use tracing::{debug, warn};

use crate::module::{BuildState, ModuleError};

pub use console::ConsoleRecovery;

/// Number of fixed menu entries before the alternates.
const FIXED_CHOICES: usize = 4;

/// Everything a policy may base its decision on.
#[derive(Debug, Clone, Copy)]
pub struct Failure<'a> {
  pub module: &'a str,
  pub state: BuildState,
  pub next: BuildState,
  pub error: &'a ModuleError,
  pub alternates: &'a [BuildState],
  pub build_dir: &'a Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
  Resume(BuildState),
  Poison,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
  Retry,
  Accept,
  Abandon,
  Shell,
  /// Zero-based index into the failure's alternates.
  Alternate(usize),
}

impl MenuChoice {
  /// The decision this choice stands for, or `None` when the policy has to
  /// ask again (shell, or an alternate the failure does not offer).
  pub fn decision(self, failure: &Failure<'_>) -> Option<Decision> {
    match self {
      MenuChoice::Retry => Some(Decision::Resume(failure.state)),
      MenuChoice::Accept => Some(Decision::Resume(failure.next)),
      MenuChoice::Abandon => Some(Decision::Poison),
      MenuChoice::Shell => None,
      MenuChoice::Alternate(i) => failure.alternates.get(i).copied().map(Decision::Resume),
    }
  }
}

/// Parse a menu answer. Anything but a listed number is `None`.
pub fn parse_choice(input: &str, alternates: &[BuildState]) -> Option<MenuChoice> {
  let n: usize = input.trim().parse().ok()?;
  match n {
    1 => Some(MenuChoice::Retry),
    2 => Some(MenuChoice::Accept),
    3 => Some(MenuChoice::Abandon),
    4 => Some(MenuChoice::Shell),
    n if n > FIXED_CHOICES && n - FIXED_CHOICES <= alternates.len() => {
      Some(MenuChoice::Alternate(n - FIXED_CHOICES - 1))
    }
    _ => None,
  }
}

/// Menu lines for a failure, numbered from 1.
pub fn menu_entries(failure: &Failure<'_>) -> Vec<String> {
  let mut entries = vec![
    format!("rerun stage {}", failure.state),
    format!("ignore error and continue to {}", failure.next),
    "give up on module".to_string(),
    "start shell".to_string(),
  ];
  entries.extend(failure.alternates.iter().map(|alt| format!("go to stage {}", alt)));
  entries
}

/// Decides how to continue after a module error.
pub trait RecoveryPolicy {
  fn decide(&mut self, failure: &Failure<'_>) -> Decision;
}

/// Unattended behaviour for every error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedRecovery {
  /// Poison the module on the first error.
  Abandon,
  /// Accept every error and continue with the proposed next state.
  ///
  /// When the proposed state is the failing one, no progress is possible and
  /// the module is poisoned instead.
  Continue,
}

impl RecoveryPolicy for FixedRecovery {
  fn decide(&mut self, failure: &Failure<'_>) -> Decision {
    let decision = match self {
      FixedRecovery::Abandon => Decision::Poison,
      FixedRecovery::Continue if failure.next == failure.state => Decision::Poison,
      FixedRecovery::Continue => Decision::Resume(failure.next),
    };
    debug!(module = failure.module, state = %failure.state, ?decision, "fixed recovery decision");
    decision
  }
}

/// Replays a queue of menu choices, poisoning once it runs dry.
///
/// Choices that cannot be applied to the failure at hand (a shell request or
/// an alternate that is not offered) are skipped, like an invalid answer at
/// the console.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRecovery {
  choices: VecDeque<MenuChoice>,
}

impl ScriptedRecovery {
  pub fn new(choices: impl IntoIterator<Item = MenuChoice>) -> Self {
    Self {
      choices: choices.into_iter().collect(),
    }
  }

  pub fn remaining(&self) -> usize {
    self.choices.len()
  }
}

impl RecoveryPolicy for ScriptedRecovery {
  fn decide(&mut self, failure: &Failure<'_>) -> Decision {
    while let Some(choice) = self.choices.pop_front() {
      if let Some(decision) = choice.decision(failure) {
        return decision;
      }
      debug!(module = failure.module, ?choice, "skipping scripted choice");
    }
    warn!(module = failure.module, state = %failure.state, "no scripted choice left, giving up on module");
    Decision::Poison
  }
}
