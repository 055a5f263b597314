//! Moduleset files.
//!
//! A moduleset is a TOML file with one `[modules.<name>]` table per module,
//! tagged by `kind`:
//!
//! ```toml
//! [modules.zlib]
//! kind = "tarball"
//! version = "1.3.1"
//! url = "https://zlib.net/zlib-1.3.1.tar.gz"
//! size = 1512791
//! patches = ["zlib-pkgconfig.patch", { path = "zlib-cross.patch", strip = 0 }]
//!
//! [modules.glib]
//! kind = "vcs"
//! dependencies = ["zlib"]
//! revision = "glib-2-80"
//!
//! [modules.meta-platform]
//! kind = "meta"
//! dependencies = ["glib"]
//! ```
//!
//! Patch paths are relative to the moduleset file's directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::module::{ModuleDescriptor, ModuleKind, Patch, TarballSource, VcsSource};

use super::ModuleRegistry;

const DEFAULT_PATCH_STRIP: u32 = 1;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModulesetFile {
  #[serde(default)]
  modules: BTreeMap<String, ModuleEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
enum ModuleEntry {
  Vcs {
    #[serde(default)]
    dependencies: Vec<String>,
    /// Path inside the repository, defaults to the module name.
    module: Option<String>,
    repository: Option<String>,
    checkout_dir: Option<String>,
    revision: Option<String>,
    #[serde(default)]
    configure_args: Vec<String>,
  },
  Tarball {
    #[serde(default)]
    dependencies: Vec<String>,
    version: String,
    url: String,
    size: u64,
    sha256: Option<String>,
    #[serde(default)]
    patches: Vec<PatchEntry>,
  },
  Meta {
    #[serde(default)]
    dependencies: Vec<String>,
  },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PatchEntry {
  Path(String),
  Full {
    path: String,
    #[serde(default = "default_strip")]
    strip: u32,
  },
}

fn default_strip() -> u32 {
  DEFAULT_PATCH_STRIP
}

/// Load a moduleset file into a fresh registry.
pub fn load_moduleset(path: &Path) -> Result<ModuleRegistry, ConfigError> {
  let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  let file: ModulesetFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
    path: path.to_path_buf(),
    source,
  })?;

  let base = path.parent().unwrap_or_else(|| Path::new("."));
  let mut registry = ModuleRegistry::new();
  for (name, entry) in file.modules {
    let module = descriptor(name, entry, base)?;
    debug!(module = %module.name, kind = module.kind_name(), "loaded module");
    registry.register(module);
  }

  info!(path = %path.display(), modules = registry.len(), "loaded moduleset");
  Ok(registry)
}

fn descriptor(name: String, entry: ModuleEntry, base: &Path) -> Result<ModuleDescriptor, ConfigError> {
  let invalid = |message: &str| ConfigError::InvalidModule {
    name: name.clone(),
    message: message.to_string(),
  };

  let (dependencies, kind) = match entry {
    ModuleEntry::Vcs {
      dependencies,
      module,
      repository,
      checkout_dir,
      revision,
      configure_args,
    } => {
      let module = module.unwrap_or_else(|| name.clone());
      if module.is_empty() {
        return Err(invalid("module path is empty"));
      }
      let source = VcsSource {
        module,
        repository,
        checkout_dir,
        revision,
        configure_args,
      };
      (dependencies, ModuleKind::Vcs(source))
    }

    ModuleEntry::Tarball {
      dependencies,
      version,
      url,
      size,
      sha256,
      patches,
    } => {
      if url.trim().is_empty() {
        return Err(invalid("url is empty"));
      }
      if let Some(hash) = &sha256
        && (hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()))
      {
        return Err(invalid("sha256 must be 64 hex characters"));
      }
      let patches = patches
        .into_iter()
        .map(|entry| {
          let (path, strip) = match entry {
            PatchEntry::Path(path) => (path, DEFAULT_PATCH_STRIP),
            PatchEntry::Full { path, strip } => (path, strip),
          };
          if path.is_empty() {
            return Err(invalid("patch path is empty"));
          }
          Ok(Patch {
            path: resolve(base, &path),
            strip,
          })
        })
        .collect::<Result<Vec<_>, _>>()?;
      let source = TarballSource {
        version,
        url,
        size,
        sha256,
        patches,
      };
      (dependencies, ModuleKind::Tarball(source))
    }

    ModuleEntry::Meta { dependencies } => (dependencies, ModuleKind::Meta),
  };

  if dependencies.iter().any(|dep| dep == &name) {
    return Err(invalid("module depends on itself"));
  }

  Ok(ModuleDescriptor::new(name, kind).with_dependencies(dependencies))
}

fn resolve(base: &Path, path: &str) -> PathBuf {
  let path = Path::new(path);
  if path.is_absolute() {
    path.to_path_buf()
  } else {
    base.join(path)
  }
}
