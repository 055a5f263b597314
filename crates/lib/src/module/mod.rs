//! Module descriptors and their build state machines.
//!
//! A [`ModuleDescriptor`] is pure data: a name, ordered dependency names and a
//! kind-specific source description. It never stores its own progress. The
//! driver owns the current [`BuildState`] and calls
//! [`ModuleDescriptor::run_state`] once per step, receiving a [`Transition`]
//! that names the proposed next state, an optional error and any alternate
//! states the recovery policy may offer.
//!
//! Each kind supports a fixed subset of [`BuildState`]:
//!
//! | kind    | states                                                          |
//! |---------|-----------------------------------------------------------------|
//! | vcs     | start, checkout, force_checkout, configure, build, install, done |
//! | tarball | start, download, unpack, patch, build, install, done            |
//! | meta    | start, done                                                     |

mod tarball;
mod vcs;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::build::BuildContext;
use crate::config::BuildConfig;
use crate::consts::BUILD_MARKER;
use crate::execute::Invocation;

pub use tarball::{Patch, TarballSource, archive_dir_name};
pub use vcs::VcsSource;

/// One step of a module's build pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
  Start,
  Checkout,
  ForceCheckout,
  Download,
  Unpack,
  Patch,
  Configure,
  Build,
  Install,
  Done,
}

impl BuildState {
  pub fn as_str(&self) -> &'static str {
    match self {
      BuildState::Start => "start",
      BuildState::Checkout => "checkout",
      BuildState::ForceCheckout => "force_checkout",
      BuildState::Download => "download",
      BuildState::Unpack => "unpack",
      BuildState::Patch => "patch",
      BuildState::Configure => "configure",
      BuildState::Build => "build",
      BuildState::Install => "install",
      BuildState::Done => "done",
    }
  }
}

impl fmt::Display for BuildState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Per-module build failures.
///
/// These are values carried in a [`Transition`], never early returns. The
/// driver routes every one of them through the recovery policy, except
/// [`ModuleError::DependencyPoisoned`] which it raises itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
  #[error("could not fetch sources: {0}")]
  Fetch(String),

  #[error("could not unpack sources: {0}")]
  Unpack(String),

  #[error("could not apply patch: {0}")]
  Patch(String),

  #[error("configure failed: {0}")]
  Configure(String),

  #[error("compile failed: {0}")]
  Compile(String),

  #[error("install failed: {0}")]
  Install(String),

  #[error("dependency {0} could not be built")]
  DependencyPoisoned(String),

  #[error("state {0} is not part of this module's pipeline")]
  UnsupportedState(BuildState),
}

/// Outcome of running one state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
  /// Proposed next state. On failure this is where the run would continue
  /// if the error is accepted.
  pub next: BuildState,
  pub error: Option<ModuleError>,
  /// Extra states offered to the recovery policy on failure.
  pub alternates: Vec<BuildState>,
}

impl Transition {
  pub fn to(next: BuildState) -> Self {
    Self {
      next,
      error: None,
      alternates: Vec::new(),
    }
  }

  pub fn failed(next: BuildState, error: ModuleError) -> Self {
    Self {
      next,
      error: Some(error),
      alternates: Vec::new(),
    }
  }

  pub fn with_alternates(mut self, alternates: &[BuildState]) -> Self {
    self.alternates = alternates.to_vec();
    self
  }

  pub fn is_ok(&self) -> bool {
    self.error.is_none()
  }
}

/// Source kind of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModuleKind {
  Vcs(VcsSource),
  Tarball(TarballSource),
  /// Pure dependency grouping, nothing is built.
  Meta,
}

/// A named module with its dependencies and source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleDescriptor {
  pub name: String,
  pub dependencies: Vec<String>,
  #[serde(flatten)]
  pub kind: ModuleKind,
}

const VCS_STATES: &[BuildState] = &[
  BuildState::Start,
  BuildState::Checkout,
  BuildState::ForceCheckout,
  BuildState::Configure,
  BuildState::Build,
  BuildState::Install,
  BuildState::Done,
];

const TARBALL_STATES: &[BuildState] = &[
  BuildState::Start,
  BuildState::Download,
  BuildState::Unpack,
  BuildState::Patch,
  BuildState::Build,
  BuildState::Install,
  BuildState::Done,
];

const META_STATES: &[BuildState] = &[BuildState::Start, BuildState::Done];

impl ModuleDescriptor {
  pub fn new(name: impl Into<String>, kind: ModuleKind) -> Self {
    Self {
      name: name.into(),
      dependencies: Vec::new(),
      kind,
    }
  }

  pub fn vcs(name: impl Into<String>, source: VcsSource) -> Self {
    Self::new(name, ModuleKind::Vcs(source))
  }

  pub fn tarball(name: impl Into<String>, source: TarballSource) -> Self {
    Self::new(name, ModuleKind::Tarball(source))
  }

  pub fn meta(name: impl Into<String>) -> Self {
    Self::new(name, ModuleKind::Meta)
  }

  pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.dependencies = dependencies.into_iter().map(Into::into).collect();
    self
  }

  pub fn kind_name(&self) -> &'static str {
    match self.kind {
      ModuleKind::Vcs(_) => "vcs",
      ModuleKind::Tarball(_) => "tarball",
      ModuleKind::Meta => "meta",
    }
  }

  /// The states this module's pipeline is made of, in pipeline order.
  pub fn states(&self) -> &'static [BuildState] {
    match self.kind {
      ModuleKind::Vcs(_) => VCS_STATES,
      ModuleKind::Tarball(_) => TARBALL_STATES,
      ModuleKind::Meta => META_STATES,
    }
  }

  pub fn supports(&self, state: BuildState) -> bool {
    self.states().contains(&state)
  }

  /// Directory the module's configure, build and install commands run in.
  pub fn build_dir(&self, config: &BuildConfig) -> PathBuf {
    match &self.kind {
      ModuleKind::Vcs(source) => source.build_dir(config),
      ModuleKind::Tarball(source) => source.build_dir(config),
      ModuleKind::Meta => config.checkout_root.clone(),
    }
  }

  /// Run a single state and report where the pipeline should go next.
  pub async fn run_state(&self, ctx: &BuildContext<'_>, state: BuildState) -> Transition {
    if !self.supports(state) {
      return Transition::failed(state, ModuleError::UnsupportedState(state));
    }
    if state == BuildState::Done {
      return Transition::to(BuildState::Done);
    }

    debug!(module = %self.name, state = %state, "running state");
    match &self.kind {
      ModuleKind::Vcs(source) => vcs::run_state(&self.name, source, ctx, state).await,
      ModuleKind::Tarball(source) => tarball::run_state(&self.name, source, ctx, state).await,
      ModuleKind::Meta => Transition::to(BuildState::Done),
    }
  }
}

/// Whether a previous configure run left its marker in `build_dir`.
pub(crate) fn is_configured(build_dir: &Path) -> bool {
  build_dir.join(BUILD_MARKER).exists()
}

fn make(config: &BuildConfig) -> Invocation {
  Invocation::new("make").args(config.make_args.iter().cloned())
}

/// `make` in the build directory. Shared by every buildable kind.
pub(crate) async fn run_build(
  name: &str,
  build_dir: &Path,
  ctx: &BuildContext<'_>,
  alternates: &[BuildState],
) -> Transition {
  ctx.report(&format!("running build for {}", name));
  match ctx.run_command(&make(ctx.config), build_dir).await {
    Ok(()) => Transition::to(BuildState::Install),
    Err(message) => {
      Transition::failed(BuildState::Install, ModuleError::Compile(message)).with_alternates(alternates)
    }
  }
}

/// `make install`. The pipeline always ends after this, failed or not.
pub(crate) async fn run_install(name: &str, build_dir: &Path, ctx: &BuildContext<'_>) -> Transition {
  ctx.report(&format!("running install for {}", name));
  match ctx.run_command(&make(ctx.config).arg("install"), build_dir).await {
    Ok(()) => Transition::to(BuildState::Done),
    Err(message) => Transition::failed(BuildState::Done, ModuleError::Install(message)),
  }
}
