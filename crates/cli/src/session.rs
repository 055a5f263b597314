//! Configuration and moduleset resolution shared by every command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use jhb_lib::config::ConfigFile;
use jhb_lib::platform::paths;
use jhb_lib::registry::{BuildPlan, ModuleRegistry, load_moduleset};

pub struct Session {
  pub config_path: PathBuf,
  /// Whether `config_path` was found; a missing default config means defaults.
  pub config_found: bool,
  pub file: ConfigFile,
  pub moduleset_path: Option<PathBuf>,
}

impl Session {
  /// Load the configuration file.
  ///
  /// An explicitly named config must exist. The default one may be missing,
  /// in which case every setting takes its default value.
  pub fn load(config: Option<&Path>, moduleset: Option<&Path>) -> Result<Self> {
    let (config_path, explicit) = match config {
      Some(path) => (path.to_path_buf(), true),
      None => (paths::default_config_path(), false),
    };

    let config_found = config_path.is_file();
    let file = if config_found {
      ConfigFile::load(&config_path).context("Failed to load configuration")?
    } else if explicit {
      bail!("Config file not found: {}", config_path.display());
    } else {
      debug!(path = %config_path.display(), "no config file, using defaults");
      ConfigFile::default()
    };

    let moduleset_path = moduleset
      .map(Path::to_path_buf)
      .or_else(|| file.moduleset_path(&config_path));

    Ok(Self {
      config_path,
      config_found,
      file,
      moduleset_path,
    })
  }

  pub fn registry(&self) -> Result<ModuleRegistry> {
    let Some(path) = &self.moduleset_path else {
      bail!(
        "No moduleset configured. Pass --moduleset or set `moduleset` in {}",
        self.config_path.display()
      );
    };
    load_moduleset(path).with_context(|| format!("Failed to load moduleset {}", path.display()))
  }

  /// Seeds from the command line, else from the config, else every module.
  /// Skips from both sources apply.
  pub fn plan<'r>(&self, registry: &'r ModuleRegistry, modules: &[String], skip: &[String]) -> Result<BuildPlan<'r>> {
    let skip: Vec<&str> = self.file.skip.iter().chain(skip).map(String::as_str).collect();
    let seed: &[String] = if modules.is_empty() { &self.file.modules } else { modules };

    let plan = if seed.is_empty() {
      registry.full_plan(skip.as_slice())
    } else {
      registry.expand(seed, skip.as_slice())
    };
    plan.context("Failed to compute build order")
  }
}
