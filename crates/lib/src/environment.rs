//! Process environment for commands run against an install prefix.
//!
//! Commands never inherit ad-hoc mutations of the parent environment; the
//! driver receives a complete [`EnvMap`] once, before any module is built, and
//! passes it explicitly to every command invocation.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use tracing::debug;

use crate::build::SetupError;
use crate::consts::APP_NAME;

/// Environment variables applied to every spawned process.
pub type EnvMap = BTreeMap<String, String>;

/// Computes the environment for building into a prefix.
pub trait EnvironmentProvider {
  fn prepare(&self, prefix: &Path) -> Result<EnvMap, SetupError>;
}

/// Prepends prefix-scoped directories to the usual toolchain search paths.
#[derive(Debug, Clone, Default)]
pub struct PrefixEnvironment {
  base: EnvMap,
}

impl PrefixEnvironment {
  /// Start from an explicit base environment.
  pub fn new(base: EnvMap) -> Self {
    Self { base }
  }

  /// Start from the current process environment.
  pub fn from_process() -> Self {
    Self::new(std::env::vars().collect())
  }
}

impl EnvironmentProvider for PrefixEnvironment {
  fn prepare(&self, prefix: &Path) -> Result<EnvMap, SetupError> {
    let mut env = self.base.clone();
    let libdir = prefix.join("lib");
    let includedir = prefix.join("include");
    let sharedir = prefix.join("share");

    env.insert(var_name("PREFIX"), prefix.display().to_string());
    env.insert(var_name("LIBDIR"), libdir.display().to_string());
    let unmangled = env.get("LD_LIBRARY_PATH").cloned().unwrap_or_default();
    env.insert("UNMANGLED_LD_LIBRARY_PATH".to_string(), unmangled);

    add_path(&mut env, "LD_LIBRARY_PATH", &libdir);
    add_path(&mut env, "DYLD_FALLBACK_LIBRARY_PATH", &libdir);
    prepend_flag(&mut env, "LDFLAGS", &format!("-L{}", libdir.display()));
    add_path(&mut env, "C_INCLUDE_PATH", &includedir);
    add_path(&mut env, "CPLUS_INCLUDE_PATH", &includedir);
    add_path(&mut env, "PATH", &prefix.join("bin"));

    // The empty entry keeps man's built-in search path after ours.
    add_path(&mut env, "MANPATH", Path::new(""));
    add_path(&mut env, "MANPATH", &sharedir.join("man"));
    add_path(&mut env, "INFOPATH", &sharedir.join("info"));

    add_path(&mut env, "PKG_CONFIG_PATH", &sharedir.join("pkgconfig"));
    add_path(&mut env, "PKG_CONFIG_PATH", &libdir.join("pkgconfig"));
    add_path(&mut env, "GI_TYPELIB_PATH", &libdir.join("girepository-1.0"));

    env
      .entry("XDG_DATA_DIRS".to_string())
      .or_insert_with(|| "/usr/local/share:/usr/share".to_string());
    add_path(&mut env, "XDG_DATA_DIRS", &sharedir);
    env
      .entry("XDG_CONFIG_DIRS".to_string())
      .or_insert_with(|| "/etc/xdg".to_string());
    add_path(&mut env, "XDG_CONFIG_DIRS", &prefix.join("etc").join("xdg"));

    let aclocaldir = sharedir.join("aclocal");
    add_path(&mut env, "ACLOCAL_PATH", &aclocaldir);
    std::fs::create_dir_all(&aclocaldir).map_err(|source| SetupError::CreateDir {
      path: aclocaldir.clone(),
      source,
    })?;
    for system_dir in ["/usr/share/aclocal", "/usr/local/share/aclocal"] {
      if Path::new(system_dir).exists() {
        add_include_flag(&mut env, "ACLOCAL_FLAGS", Path::new(system_dir));
      }
    }
    add_include_flag(&mut env, "ACLOCAL_FLAGS", &aclocaldir);

    add_path(&mut env, "PERL5LIB", &libdir.join("perl5"));
    env.insert(format!("UNDER_{}", APP_NAME.to_uppercase()), "true".to_string());

    debug!(prefix = %prefix.display(), vars = env.len(), "prepared build environment");
    Ok(env)
  }
}

fn var_name(suffix: &str) -> String {
  format!("{}_{}", APP_NAME.to_uppercase(), suffix)
}

/// Put `path` at the front of a colon-separated list, dropping later duplicates.
pub fn add_path(env: &mut EnvMap, var: &str, path: &Path) {
  let path = path.display().to_string();
  let existing = env.get(var).cloned().unwrap_or_else(|| path.clone());

  let mut seen = HashSet::new();
  let joined = std::iter::once(path.as_str())
    .chain(existing.split(':'))
    .filter(|part| seen.insert(*part))
    .collect::<Vec<_>>()
    .join(":");

  env.insert(var.to_string(), joined);
}

/// Put `-I <dir>` at the front of a flag string, dropping repeated include pairs.
pub fn add_include_flag(env: &mut EnvMap, var: &str, dir: &Path) {
  let dir = dir.display().to_string();
  let existing = env.get(var).cloned().unwrap_or_default();

  let mut tokens = vec!["-I".to_string(), dir];
  tokens.extend(existing.split_whitespace().map(str::to_string));

  let mut seen = HashSet::new();
  let mut flags = Vec::with_capacity(tokens.len());
  let mut iter = tokens.into_iter();
  while let Some(token) = iter.next() {
    if token != "-I" {
      flags.push(token);
      continue;
    }
    match iter.next() {
      Some(dir) => {
        if seen.insert(dir.clone()) {
          flags.push(token);
          flags.push(dir);
        }
      }
      None => flags.push(token),
    }
  }

  env.insert(var.to_string(), flags.join(" "));
}

/// Prepend a single flag to a space-separated flag variable.
pub fn prepend_flag(env: &mut EnvMap, var: &str, flag: &str) {
  let value = match env.get(var).map(|v| v.trim()).filter(|v| !v.is_empty()) {
    Some(existing) => format!("{} {}", flag, existing),
    None => flag.to_string(),
  };
  env.insert(var.to_string(), value);
}
