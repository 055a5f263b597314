use crate::consts::{APP_NAME, CONFIG_FILENAME};
use std::path::PathBuf;

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  std::env::var_os("USERPROFILE")
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("C:\\"))
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  std::env::var_os("HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("/"))
}

/// Returns the directory for configuration files for the application
#[cfg(windows)]
pub fn config_dir() -> PathBuf {
  std::env::var_os("APPDATA")
    .map(PathBuf::from)
    .unwrap_or_else(|| home_dir().join("AppData").join("Roaming"))
    .join(APP_NAME)
}

/// Returns the directory for configuration files for the application
#[cfg(not(windows))]
pub fn config_dir() -> PathBuf {
  let config_home = std::env::var("XDG_CONFIG_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".config"));
  config_home.join(APP_NAME)
}

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
  config_dir().join(CONFIG_FILENAME)
}

/// Default checkout root when the configuration does not name one.
pub fn default_checkout_root() -> PathBuf {
  home_dir().join("checkout").join("gnome")
}

/// Expands a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
  if path == "~" {
    return home_dir();
  }
  match path.strip_prefix("~/") {
    Some(rest) => home_dir().join(rest),
    None => PathBuf::from(path),
  }
}
