//! Build configuration.
//!
//! [`BuildConfig`] is the immutable view of a run that module state handlers
//! read. [`ConfigFile`] is its on-disk TOML form, which additionally carries
//! the inputs the CLI needs to produce a plan (moduleset, seed and skip lists).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{DEFAULT_CONFIGURE_ARGS, DEFAULT_PREFIX};
use crate::platform::paths::{default_checkout_root, expand_tilde};

/// Errors raised while loading configuration or moduleset files.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid module '{name}': {message}")]
  InvalidModule { name: String, message: String },
}

/// Settings that stay fixed for the duration of one build run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildConfig {
  /// Install prefix passed to configure scripts.
  pub prefix: PathBuf,
  /// Base directory for every module's source and build tree.
  pub checkout_root: PathBuf,
  /// Default repository base for version-controlled modules without their own.
  pub repository: Option<String>,
  /// Never touch the network; use whatever is already checked out.
  pub no_network: bool,
  /// Only fetch sources, do not configure, build or install.
  pub no_build: bool,
  /// Re-run configure even when the build marker already exists.
  pub always_configure: bool,
  /// Arguments appended to every configure invocation.
  pub configure_args: Vec<String>,
  /// Arguments passed to every `make` invocation.
  pub make_args: Vec<String>,
  /// Continue past archive download/unpack failures instead of staying on the failing step.
  pub lenient_archives: bool,
}

impl Default for BuildConfig {
  fn default() -> Self {
    Self {
      prefix: PathBuf::from(DEFAULT_PREFIX),
      checkout_root: default_checkout_root(),
      repository: None,
      no_network: false,
      no_build: false,
      always_configure: false,
      configure_args: DEFAULT_CONFIGURE_ARGS.iter().map(|s| s.to_string()).collect(),
      make_args: Vec::new(),
      lenient_archives: true,
    }
  }
}

/// On-disk configuration file.
///
/// Every field is optional; missing fields fall back to [`BuildConfig::default`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
  pub prefix: Option<String>,
  pub checkout_root: Option<String>,
  pub repository: Option<String>,
  /// Moduleset file, relative paths resolve against the config file's directory.
  pub moduleset: Option<String>,
  /// Modules to build when none are given on the command line.
  pub modules: Vec<String>,
  /// Modules excluded from every plan.
  pub skip: Vec<String>,
  pub no_network: bool,
  pub no_build: bool,
  pub always_configure: bool,
  pub configure_args: Option<Vec<String>>,
  pub make_args: Vec<String>,
  pub lenient_archives: Option<bool>,
}

impl ConfigFile {
  /// Load a configuration file from disk.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Resolve the values that module state handlers read.
  pub fn build_config(&self) -> BuildConfig {
    let defaults = BuildConfig::default();
    BuildConfig {
      prefix: self.prefix.as_deref().map(expand_tilde).unwrap_or(defaults.prefix),
      checkout_root: self
        .checkout_root
        .as_deref()
        .map(expand_tilde)
        .unwrap_or(defaults.checkout_root),
      repository: self.repository.clone(),
      no_network: self.no_network,
      no_build: self.no_build,
      always_configure: self.always_configure,
      configure_args: self.configure_args.clone().unwrap_or(defaults.configure_args),
      make_args: self.make_args.clone(),
      lenient_archives: self.lenient_archives.unwrap_or(defaults.lenient_archives),
    }
  }

  /// Moduleset path, resolved against `config_path`'s directory when relative.
  pub fn moduleset_path(&self, config_path: &Path) -> Option<PathBuf> {
    let raw = expand_tilde(self.moduleset.as_deref()?);
    if raw.is_absolute() {
      return Some(raw);
    }
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    Some(base.join(raw))
  }
}
