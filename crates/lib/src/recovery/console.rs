//! Interactive recovery at a terminal.

use std::io::{BufRead, Write};
use std::process::Command;

use tracing::{info, warn};

use crate::environment::EnvMap;
use crate::execute::Invocation;

use super::{Decision, Failure, MenuChoice, RecoveryPolicy, menu_entries, parse_choice};

/// Prompts on `output` and reads answers from `input`, one line per answer.
///
/// Invalid answers re-prompt. End of input gives up on the module, since no
/// further answer can arrive.
pub struct ConsoleRecovery<R, W> {
  input: R,
  output: W,
  shell: Invocation,
  env: EnvMap,
}

impl<R: BufRead, W: Write> ConsoleRecovery<R, W> {
  pub fn new(input: R, output: W) -> Self {
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
    Self {
      input,
      output,
      shell: Invocation::new(shell),
      env: EnvMap::new(),
    }
  }

  /// Command started for the "start shell" choice.
  pub fn with_shell(mut self, shell: Invocation) -> Self {
    self.shell = shell;
    self
  }

  /// Environment for the shell, normally the prepared build environment.
  pub fn with_env(mut self, env: EnvMap) -> Self {
    self.env = env;
    self
  }

  pub fn into_output(self) -> W {
    self.output
  }

  fn prompt(&mut self, failure: &Failure<'_>) -> std::io::Result<Option<MenuChoice>> {
    writeln!(self.output)?;
    for (i, entry) in menu_entries(failure).iter().enumerate() {
      writeln!(self.output, "  [{}] {}", i + 1, entry)?;
    }
    write!(self.output, "choice: ")?;
    self.output.flush()?;

    let mut line = String::new();
    if self.input.read_line(&mut line)? == 0 {
      return Err(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "no more input",
      ));
    }
    Ok(parse_choice(&line, failure.alternates))
  }

  fn run_shell(&mut self, failure: &Failure<'_>) -> std::io::Result<()> {
    writeln!(
      self.output,
      "starting {} in {}, exit to return to the menu",
      self.shell,
      failure.build_dir.display()
    )?;
    info!(module = failure.module, dir = %failure.build_dir.display(), "starting recovery shell");

    let status = Command::new(&self.shell.program)
      .args(&self.shell.args)
      .current_dir(failure.build_dir)
      .envs(&self.env)
      .status();
    if let Err(e) = status {
      writeln!(self.output, "could not start shell: {}", e)?;
    }
    Ok(())
  }

  fn ask(&mut self, failure: &Failure<'_>) -> std::io::Result<Decision> {
    loop {
      let choice = self.prompt(failure)?;
      match choice {
        Some(MenuChoice::Shell) => self.run_shell(failure)?,
        Some(choice) => {
          if let Some(decision) = choice.decision(failure) {
            return Ok(decision);
          }
        }
        None => writeln!(self.output, "invalid choice")?,
      }
    }
  }
}

impl<R: BufRead, W: Write> RecoveryPolicy for ConsoleRecovery<R, W> {
  fn decide(&mut self, failure: &Failure<'_>) -> Decision {
    match self.ask(failure) {
      Ok(decision) => decision,
      Err(e) => {
        warn!(module = failure.module, error = %e, "cannot prompt for recovery, giving up on module");
        Decision::Poison
      }
    }
  }
}
