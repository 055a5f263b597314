//! Command execution.
//!
//! Every command is an argument vector run with an explicit working directory
//! and environment. Nothing here changes the parent's current directory or
//! environment, so one module's step can never leak state into the next.

pub mod fetch;
pub mod unpack;

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::environment::EnvMap;

pub use fetch::{CheckoutRequest, Downloader, FetchError, GitFetcher, HttpDownloader, VcsFetcher};
pub use unpack::{UnpackError, unpack_archive};

/// Errors from spawning a command.
#[derive(Debug, Error)]
pub enum ExecuteError {
  #[error("failed to run {command} in {cwd}: {source}")]
  Spawn {
    command: String,
    cwd: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<String>,
}

impl Invocation {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }
}

impl fmt::Display for Invocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      if arg.is_empty() || arg.contains(char::is_whitespace) {
        write!(f, " '{}'", arg.replace('\'', r"'\''"))?;
      } else {
        write!(f, " {}", arg)?;
      }
    }
    Ok(())
  }
}

/// Runs a command to completion and returns its exit code.
///
/// A process killed by a signal reports `-1`.
#[async_trait]
pub trait CommandRunner: Send + Sync {
  async fn run(&self, invocation: &Invocation, cwd: &Path, env: &EnvMap) -> Result<i32, ExecuteError>;
}

/// Spawns real processes, streaming their output to the terminal.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
  quiet: bool,
}

impl ProcessRunner {
  pub fn new() -> Self {
    Self::default()
  }

  /// Discard the child's stdout and stderr instead of inheriting them.
  pub fn quiet(mut self) -> Self {
    self.quiet = true;
    self
  }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
  async fn run(&self, invocation: &Invocation, cwd: &Path, env: &EnvMap) -> Result<i32, ExecuteError> {
    info!(command = %invocation, cwd = %cwd.display(), "executing command");

    let mut command = Command::new(resolve_program(&invocation.program, cwd));
    command.args(&invocation.args).current_dir(cwd).envs(env);
    if self.quiet {
      command.stdout(Stdio::null()).stderr(Stdio::null());
    }

    let status = command.status().await.map_err(|source| ExecuteError::Spawn {
      command: invocation.to_string(),
      cwd: cwd.to_path_buf(),
      source,
    })?;

    let code = status.code().unwrap_or(-1);
    if code != 0 {
      debug!(command = %invocation, code, "command exited with failure");
    }
    Ok(code)
  }
}

/// Programs given as `./name` or `../name` are relative to the command's working directory.
fn resolve_program(program: &str, cwd: &Path) -> PathBuf {
  if program.starts_with("./") || program.starts_with("../") {
    cwd.join(program)
  } else {
    PathBuf::from(program)
  }
}
