use anyhow::Result;
use serde::Serialize;

use jhb_lib::config::BuildConfig;

use crate::output::{OutputFormat, print_json, print_stat};
use crate::session::Session;

#[derive(Serialize)]
struct Info<'a> {
  version: &'static str,
  config_path: String,
  config_found: bool,
  moduleset: Option<String>,
  #[serde(flatten)]
  config: &'a BuildConfig,
}

/// Show where configuration comes from and the values a build would use.
pub fn cmd_info(session: &Session, format: OutputFormat) -> Result<()> {
  let config = session.file.build_config();
  let info = Info {
    version: env!("CARGO_PKG_VERSION"),
    config_path: session.config_path.display().to_string(),
    config_found: session.config_found,
    moduleset: session.moduleset_path.as_ref().map(|p| p.display().to_string()),
    config: &config,
  };

  if format.is_json() {
    return print_json(&info);
  }

  println!("jhb v{}", info.version);
  let config_label = if info.config_found {
    info.config_path.clone()
  } else {
    format!("{} (not found, using defaults)", info.config_path)
  };
  print_stat("Config", &config_label);
  print_stat("Moduleset", info.moduleset.as_deref().unwrap_or("(none)"));
  print_stat("Prefix", &config.prefix.display().to_string());
  print_stat("Checkout root", &config.checkout_root.display().to_string());
  print_stat("Repository", config.repository.as_deref().unwrap_or("(none)"));
  print_stat("Configure args", &config.configure_args.join(" "));
  print_stat("Make args", &config.make_args.join(" "));
  Ok(())
}
