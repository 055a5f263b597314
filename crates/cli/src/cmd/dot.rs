use anyhow::Result;

use jhb_lib::registry::ModuleRegistry;

use crate::session::Session;

/// Print the dependency graph, optionally limited to what `modules` pull in.
pub fn cmd_dot(session: &Session, modules: &[String]) -> Result<()> {
  let registry = session.registry()?;
  if modules.is_empty() {
    print!("{}", registry.to_dot());
    return Ok(());
  }

  let plan = registry.expand(modules, &[] as &[&str])?;
  let subset: ModuleRegistry = plan.iter().cloned().collect();
  print!("{}", subset.to_dot());
  Ok(())
}
