//! The build driver.
//!
//! [`setup`] validates the prefix and checkout root and prepares the build
//! environment once. [`BuildDriver::build`] then walks a [`BuildPlan`] strictly
//! in order, one module and one state at a time, poisoning modules that are
//! abandoned or whose dependencies were poisoned earlier in the run.

mod types;

pub use types::*;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::BuildConfig;
use crate::environment::{EnvMap, EnvironmentProvider};
use crate::execute::{CommandRunner, Downloader, GitFetcher, HttpDownloader, Invocation, ProcessRunner, VcsFetcher};
use crate::module::{BuildState, ModuleDescriptor, ModuleError};
use crate::recovery::{Decision, Failure, FixedRecovery, RecoveryPolicy};
use crate::registry::BuildPlan;

/// Position of a module in the plan, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
  pub index: usize,
  pub total: usize,
}

impl Progress {
  pub fn new(index: usize, total: usize) -> Self {
    Self { index, total }
  }
}

impl fmt::Display for Progress {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}/{}]", self.index, self.total)
  }
}

/// Sink for human-readable progress messages.
pub trait Reporter: Send + Sync {
  fn report(&self, message: &str, progress: Option<Progress>);
}

/// Reports through `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
  fn report(&self, message: &str, progress: Option<Progress>) {
    match progress {
      Some(progress) => info!(progress = %progress, "{}", message),
      None => info!("{}", message),
    }
  }
}

/// What a state handler can see and use.
pub struct BuildContext<'a> {
  pub config: &'a BuildConfig,
  pub env: &'a EnvMap,
  pub runner: &'a dyn CommandRunner,
  pub fetcher: &'a dyn VcsFetcher,
  pub downloader: &'a dyn Downloader,
  pub reporter: &'a dyn Reporter,
  pub progress: Progress,
}

impl BuildContext<'_> {
  pub fn report(&self, message: &str) {
    self.reporter.report(message, Some(self.progress));
  }

  /// Run a command to completion, describing any failure as a message.
  pub async fn run_command(&self, invocation: &Invocation, cwd: &Path) -> Result<(), String> {
    match self.runner.run(invocation, cwd, self.env).await {
      Ok(0) => Ok(()),
      Ok(code) => Err(format!("{} exited with status {}", invocation, code)),
      Err(e) => Err(e.to_string()),
    }
  }
}

/// Check the run's preconditions and compute the build environment.
///
/// The prefix is created when missing and must be writable. The checkout root
/// must be creatable.
pub fn setup(config: &BuildConfig, provider: &dyn EnvironmentProvider) -> Result<EnvMap, SetupError> {
  create_dir(&config.prefix)?;
  let probe = config.prefix.join(".jhb-write-test");
  std::fs::write(&probe, b"").map_err(|source| SetupError::NotWritable {
    path: config.prefix.clone(),
    source,
  })?;
  discard_probe(&probe);

  create_dir(&config.checkout_root)?;

  let env = provider.prepare(&config.prefix)?;
  info!(
    prefix = %config.prefix.display(),
    checkout_root = %config.checkout_root.display(),
    "build environment ready"
  );
  Ok(env)
}

fn discard_probe(probe: &Path) {
  if let Err(e) = std::fs::remove_file(probe) {
    warn!(path = %probe.display(), error = %e, "could not remove write probe");
  }
}

fn create_dir(path: &Path) -> Result<(), SetupError> {
  std::fs::create_dir_all(path).map_err(|source| SetupError::CreateDir {
    path: path.to_path_buf(),
    source,
  })
}

/// Drives modules through their state machines.
pub struct BuildDriver {
  config: BuildConfig,
  env: EnvMap,
  runner: Arc<dyn CommandRunner>,
  fetcher: Arc<dyn VcsFetcher>,
  downloader: Arc<dyn Downloader>,
  reporter: Arc<dyn Reporter>,
  policy: Box<dyn RecoveryPolicy>,
}

impl BuildDriver {
  /// A driver running real processes, git and HTTP, that abandons modules on
  /// the first error and reports through `tracing`.
  pub fn new(config: BuildConfig, env: EnvMap) -> Self {
    Self {
      config,
      env,
      runner: Arc::new(ProcessRunner::new()),
      fetcher: Arc::new(GitFetcher::new(ProcessRunner::new())),
      downloader: Arc::new(HttpDownloader::new()),
      reporter: Arc::new(TracingReporter),
      policy: Box::new(FixedRecovery::Abandon),
    }
  }

  pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
    self.runner = runner;
    self
  }

  pub fn with_fetcher(mut self, fetcher: Arc<dyn VcsFetcher>) -> Self {
    self.fetcher = fetcher;
    self
  }

  pub fn with_downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
    self.downloader = downloader;
    self
  }

  pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
    self.reporter = reporter;
    self
  }

  pub fn with_policy(mut self, policy: Box<dyn RecoveryPolicy>) -> Self {
    self.policy = policy;
    self
  }

  /// Build every module of `plan` in order.
  ///
  /// Module failures never abort the run; they end up in the returned report.
  pub async fn build(&mut self, plan: &BuildPlan<'_>) -> BuildReport {
    let total = plan.len();
    let mut poisoned: HashSet<&str> = HashSet::new();
    let mut report = BuildReport::default();

    info!(modules = total, "starting build");
    for (i, module) in plan.iter().enumerate() {
      let progress = Progress::new(i + 1, total);

      let blocked_by = module
        .dependencies
        .iter()
        .find(|dep| poisoned.contains(dep.as_str()));
      let outcome = match blocked_by {
        Some(dependency) => {
          self.reporter.report(
            &format!("module {} not built due to non buildable {}", module.name, dependency),
            Some(progress),
          );
          warn!(module = %module.name, dependency = %dependency, "skipping module with poisoned dependency");
          ModuleOutcome {
            name: module.name.clone(),
            states: Vec::new(),
            accepted_errors: Vec::new(),
            status: ModuleStatus::Poisoned(PoisonCause::Dependency {
              dependency: dependency.clone(),
            }),
          }
        }
        None => self.build_module(module, progress).await,
      };

      if outcome.is_poisoned() {
        poisoned.insert(module.name.as_str());
      }
      report.outcomes.push(outcome);
    }

    if report.succeeded() {
      self.reporter.report("success", None);
    } else {
      self.reporter.report(
        &format!("the following modules were not built: {}", report.poisoned().join(", ")),
        None,
      );
    }
    report
  }

  async fn build_module(&mut self, module: &ModuleDescriptor, progress: Progress) -> ModuleOutcome {
    let build_dir = module.build_dir(&self.config);
    let ctx = BuildContext {
      config: &self.config,
      env: &self.env,
      runner: self.runner.as_ref(),
      fetcher: self.fetcher.as_ref(),
      downloader: self.downloader.as_ref(),
      reporter: self.reporter.as_ref(),
      progress,
    };

    let mut outcome = ModuleOutcome {
      name: module.name.clone(),
      states: Vec::new(),
      accepted_errors: Vec::new(),
      status: ModuleStatus::Built,
    };
    let mut state = BuildState::Start;

    loop {
      if !module.supports(state) {
        let error = ModuleError::UnsupportedState(state);
        ctx.report(&format!("error during stage {} of {}: {}", state, module.name, error));
        outcome.status = ModuleStatus::Poisoned(PoisonCause::UnsupportedState { state });
        return outcome;
      }
      outcome.states.push(state);
      if state == BuildState::Done {
        debug!(module = %module.name, "module built");
        return outcome;
      }

      let transition = module.run_state(&ctx, state).await;
      let Some(error) = transition.error else {
        state = transition.next;
        continue;
      };

      ctx.report(&format!("error during stage {} of {}: {}", state, module.name, error));
      let failure = Failure {
        module: &module.name,
        state,
        next: transition.next,
        error: &error,
        alternates: &transition.alternates,
        build_dir: &build_dir,
      };

      match self.policy.decide(&failure) {
        Decision::Resume(resume) => {
          debug!(module = %module.name, from = %state, to = %resume, "resuming after error");
          if resume != state {
            outcome.accepted_errors.push(error);
          }
          state = resume;
        }
        Decision::Poison => {
          warn!(module = %module.name, state = %state, "giving up on module");
          outcome.status = ModuleStatus::Poisoned(PoisonCause::Abandoned { state, error });
          return outcome;
        }
      }
    }
  }
}
