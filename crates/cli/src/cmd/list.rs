use anyhow::Result;
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use crate::output::{OutputFormat, print_json, symbols};
use crate::session::Session;

#[derive(Serialize)]
struct ListEntry<'a> {
  name: &'a str,
  kind: &'static str,
  dependencies: &'a [String],
}

/// Print the build order for `modules`.
pub fn cmd_list(session: &Session, modules: &[String], skip: &[String], format: OutputFormat) -> Result<()> {
  let registry = session.registry()?;
  let plan = session.plan(&registry, modules, skip)?;

  if format.is_json() {
    let entries: Vec<ListEntry> = plan
      .iter()
      .map(|module| ListEntry {
        name: &module.name,
        kind: module.kind_name(),
        dependencies: &module.dependencies,
      })
      .collect();
    return print_json(&entries);
  }

  for module in plan.iter() {
    let kind = format!("({})", module.kind_name());
    if module.dependencies.is_empty() {
      println!("{} {}", module.name, kind.if_supports_color(Stream::Stdout, |s| s.dimmed()));
    } else {
      println!(
        "{} {} {} {}",
        module.name,
        kind.if_supports_color(Stream::Stdout, |s| s.dimmed()),
        symbols::ARROW,
        module.dependencies.join(", ")
      );
    }
  }

  Ok(())
}
