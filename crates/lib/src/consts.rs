/// Application name, used for config directories and environment markers.
pub const APP_NAME: &str = "jhb";

/// Name of the configuration file inside the config directory.
pub const CONFIG_FILENAME: &str = "config.toml";

/// File whose presence in a build directory means the module is already configured.
pub const BUILD_MARKER: &str = "Makefile";

/// Configure arguments used when the configuration file does not set any.
pub const DEFAULT_CONFIGURE_ARGS: &[&str] = &["--disable-static", "--disable-gtk-doc"];

/// Install prefix used when the configuration file does not set one.
pub const DEFAULT_PREFIX: &str = "/opt/gnome";
