//! Implementation of the `jhb build` command.

use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::info;

use jhb_lib::build::{BuildDriver, ModuleStatus, setup};
use jhb_lib::config::BuildConfig;
use jhb_lib::environment::PrefixEnvironment;
use jhb_lib::recovery::{ConsoleRecovery, FixedRecovery, RecoveryPolicy};

use crate::output::{ConsoleReporter, format_duration, print_error, print_info, print_stat, print_success, print_warning};
use crate::prompts::require_terminal;
use crate::session::Session;

/// Recovery policy selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnError {
  /// Prompt for what to do
  Ask,
  /// Give up on the failing module
  Abandon,
  /// Ignore the error and continue with the next stage
  Continue,
}

pub struct BuildArgs {
  pub modules: Vec<String>,
  pub skip: Vec<String>,
  pub no_network: bool,
  pub no_build: bool,
  pub always_configure: bool,
  pub prefix: Option<PathBuf>,
  pub checkout_root: Option<PathBuf>,
  pub on_error: OnError,
}

impl BuildArgs {
  /// Command-line flags take precedence over the configuration file.
  fn apply(&self, mut config: BuildConfig) -> BuildConfig {
    if let Some(prefix) = &self.prefix {
      config.prefix = prefix.clone();
    }
    if let Some(checkout_root) = &self.checkout_root {
      config.checkout_root = checkout_root.clone();
    }
    config.no_network |= self.no_network;
    config.no_build |= self.no_build;
    config.always_configure |= self.always_configure;
    config
  }
}

/// Execute the build command.
///
/// Returns whether every module in the plan was built.
pub fn cmd_build(session: &Session, args: BuildArgs) -> Result<bool> {
  let start = Instant::now();

  if args.on_error == OnError::Ask {
    require_terminal("--on-error")?;
  }

  let registry = session.registry()?;
  let plan = session.plan(&registry, &args.modules, &args.skip)?;
  let config = args.apply(session.file.build_config());

  if plan.is_empty() {
    print_warning("Nothing to build");
    return Ok(true);
  }

  let env = setup(&config, &PrefixEnvironment::from_process()).context("Failed to prepare the build environment")?;

  let policy: Box<dyn RecoveryPolicy> = match args.on_error {
    OnError::Ask => Box::new(ConsoleRecovery::new(BufReader::new(io::stdin()), io::stderr()).with_env(env.clone())),
    OnError::Abandon => Box::new(FixedRecovery::Abandon),
    OnError::Continue => Box::new(FixedRecovery::Continue),
  };

  info!(modules = plan.len(), prefix = %config.prefix.display(), "building");
  print_info(&format!("Building {} module(s) into {}", plan.len(), config.prefix.display()));
  let mut driver = BuildDriver::new(config, env)
    .with_reporter(Arc::new(ConsoleReporter))
    .with_policy(policy);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(driver.build(&plan));

  println!();
  if report.succeeded() {
    print_success("Build complete!");
  } else {
    print_error(&format!("{} module(s) not built", report.poisoned().len()));
    for outcome in &report.outcomes {
      if let ModuleStatus::Poisoned(cause) = &outcome.status {
        print_stat(&outcome.name, &cause.to_string());
      }
    }
  }
  print_stat("Modules", &plan.len().to_string());
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(report.succeeded())
}
