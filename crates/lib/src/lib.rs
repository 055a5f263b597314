//! jhb-lib: build orchestration for interdependent source modules.
//!
//! - `module`: module descriptors and their per-kind build state machines
//! - `registry`: the module registry, moduleset loading and plan expansion
//! - `build`: environment setup and the sequential build driver
//! - `recovery`: policies deciding how to continue after a module error
//! - `execute`: command execution, source fetching and archive extraction

pub mod build;
pub mod config;
pub mod consts;
pub mod environment;
pub mod execute;
pub mod module;
pub mod platform;
pub mod recovery;
pub mod registry;

#[cfg(test)]
mod testutil;

pub use build::{BuildContext, BuildDriver, BuildReport, Progress, Reporter, SetupError, setup};
pub use config::{BuildConfig, ConfigError, ConfigFile};
pub use module::{BuildState, ModuleDescriptor, ModuleError, ModuleKind, Transition};
pub use recovery::{ConsoleRecovery, Decision, Failure, FixedRecovery, MenuChoice, RecoveryPolicy, ScriptedRecovery};
pub use registry::{BuildPlan, ModuleRegistry, RegistryError, load_moduleset};
