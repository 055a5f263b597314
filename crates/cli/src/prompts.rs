use anyhow::{Result, bail};
use std::io::{self, IsTerminal};

/// Interactive recovery reads answers from stdin and prompts on stderr.
pub fn require_terminal(option: &str) -> Result<()> {
  if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
    bail!(
      "Cannot prompt for error recovery in non-interactive mode. Use {} abandon or {} continue.",
      option,
      option
    );
  }
  Ok(())
}
