//! Version-controlled modules.

use std::path::PathBuf;

use serde::Serialize;

use crate::build::BuildContext;
use crate::config::BuildConfig;
use crate::execute::{CheckoutRequest, Invocation};

use super::{BuildState, ModuleError, Transition, is_configured, run_build, run_install};

/// Offered on every recoverable failure after the sources are in place.
const RECHECKOUT: &[BuildState] = &[BuildState::ForceCheckout];

/// Where a version-controlled module comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VcsSource {
  /// Path of the module inside the repository.
  pub module: String,
  /// Repository base, overriding the configured default.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub repository: Option<String>,
  /// Directory name under the checkout root, defaults to `module`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub checkout_dir: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub revision: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub configure_args: Vec<String>,
}

impl VcsSource {
  pub fn new(module: impl Into<String>) -> Self {
    Self {
      module: module.into(),
      ..Default::default()
    }
  }

  pub fn build_dir(&self, config: &BuildConfig) -> PathBuf {
    let dir = self.checkout_dir.as_deref().unwrap_or(&self.module);
    config.checkout_root.join(dir)
  }

  /// Clone URL: repository base joined with the module path.
  ///
  /// Without any repository base the module path is used as-is.
  pub fn url(&self, config: &BuildConfig) -> String {
    match self.repository.as_deref().or(config.repository.as_deref()) {
      Some(base) => format!("{}/{}", base.trim_end_matches('/'), self.module),
      None => self.module.clone(),
    }
  }

  fn checkout_request(&self, config: &BuildConfig) -> CheckoutRequest {
    CheckoutRequest {
      url: self.url(config),
      revision: self.revision.clone(),
      dest: self.build_dir(config),
    }
  }
}

pub(super) async fn run_state(name: &str, source: &VcsSource, ctx: &BuildContext<'_>, state: BuildState) -> Transition {
  let config = ctx.config;
  let build_dir = source.build_dir(config);

  match state {
    BuildState::Start => {
      let next = if !config.no_network {
        BuildState::Checkout
      } else if config.no_build {
        BuildState::Done
      } else if is_configured(&build_dir) && !config.always_configure {
        BuildState::Build
      } else {
        BuildState::Configure
      };
      Transition::to(next)
    }

    BuildState::Checkout => {
      ctx.report(&format!("checking out {}", name));
      let next = if config.no_build {
        BuildState::Done
      } else if is_configured(&build_dir) && !config.always_configure {
        BuildState::Build
      } else {
        BuildState::Configure
      };

      let request = source.checkout_request(config);
      let result = ctx.fetcher.update(&request, ctx.env).await;
      match result {
        Ok(()) if build_dir.is_dir() => Transition::to(next),
        Ok(()) => Transition::failed(
          next,
          ModuleError::Fetch(format!("{} does not exist after update", build_dir.display())),
        )
        .with_alternates(RECHECKOUT),
        Err(e) => Transition::failed(next, ModuleError::Fetch(e.to_string())).with_alternates(RECHECKOUT),
      }
    }

    BuildState::ForceCheckout => {
      ctx.report(&format!("wiping and checking out {}", name));
      let request = source.checkout_request(config);
      let result = ctx.fetcher.fresh_checkout(&request, ctx.env).await;
      let error = match result {
        Ok(()) if build_dir.is_dir() => return Transition::to(BuildState::Configure),
        Ok(()) => format!("{} does not exist after checkout", build_dir.display()),
        Err(e) => e.to_string(),
      };
      Transition::failed(BuildState::Configure, ModuleError::Fetch(error)).with_alternates(RECHECKOUT)
    }

    BuildState::Configure => {
      ctx.report(&format!("running configure for {}", name));
      let invocation = Invocation::new("./autogen.sh")
        .arg("--prefix")
        .arg(config.prefix.display().to_string())
        .args(config.configure_args.iter().cloned())
        .args(source.configure_args.iter().cloned());

      match ctx.run_command(&invocation, &build_dir).await {
        Ok(()) => Transition::to(BuildState::Build),
        Err(message) => {
          Transition::failed(BuildState::Build, ModuleError::Configure(message)).with_alternates(RECHECKOUT)
        }
      }
    }

    BuildState::Build => run_build(name, &build_dir, ctx, RECHECKOUT).await,
    BuildState::Install => run_install(name, &build_dir, ctx).await,

    other => Transition::failed(other, ModuleError::UnsupportedState(other)),
  }
}
