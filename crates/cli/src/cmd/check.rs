use anyhow::{Result, bail};

use crate::output::{print_error, print_success};
use crate::session::Session;

/// Report unknown dependencies and cycles anywhere in the moduleset.
pub fn cmd_check(session: &Session) -> Result<()> {
  let registry = session.registry()?;
  let problems = registry.check();

  if problems.is_empty() {
    print_success(&format!("Moduleset OK: {} modules", registry.len()));
    return Ok(());
  }

  for problem in &problems {
    print_error(&problem.to_string());
  }
  bail!("Moduleset has {} problem(s)", problems.len());
}
