//! Source fetching: version-control checkouts and archive downloads.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::environment::EnvMap;

use super::{CommandRunner, ExecuteError, Invocation};

/// Errors that can occur while fetching sources.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("{command} exited with status {code}")]
  CommandFailed { command: String, code: i32 },

  #[error(transparent)]
  Execute(#[from] ExecuteError),

  #[error("io error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("download of {url} failed: {message}")]
  Http { url: String, message: String },
}

/// Where to check a module out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
  pub url: String,
  pub revision: Option<String>,
  pub dest: PathBuf,
}

/// Version-control operations used by the checkout states.
#[async_trait]
pub trait VcsFetcher: Send + Sync {
  /// Bring an existing checkout up to date, creating it when absent.
  async fn update(&self, request: &CheckoutRequest, env: &EnvMap) -> Result<(), FetchError>;

  /// Discard any local checkout and fetch a new one.
  async fn fresh_checkout(&self, request: &CheckoutRequest, env: &EnvMap) -> Result<(), FetchError>;
}

/// Fetches a URL to a local file.
#[async_trait]
pub trait Downloader: Send + Sync {
  async fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError>;
}

/// Git checkouts driven through the `git` command line.
#[derive(Debug, Clone, Default)]
pub struct GitFetcher<R> {
  runner: R,
}

impl<R: CommandRunner> GitFetcher<R> {
  pub fn new(runner: R) -> Self {
    Self { runner }
  }

  async fn git(&self, invocation: Invocation, cwd: &Path, env: &EnvMap) -> Result<(), FetchError> {
    let code = self.runner.run(&invocation, cwd, env).await?;
    if code == 0 {
      Ok(())
    } else {
      Err(FetchError::CommandFailed {
        command: invocation.to_string(),
        code,
      })
    }
  }

  async fn clone_into(&self, request: &CheckoutRequest, env: &EnvMap) -> Result<(), FetchError> {
    let parent = request.dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).await.map_err(|source| FetchError::Io {
      path: parent.to_path_buf(),
      source,
    })?;

    let mut clone = Invocation::new("git").arg("clone");
    if let Some(rev) = &request.revision {
      clone = clone.arg("--branch").arg(rev);
    }
    let clone = clone
      .arg(&request.url)
      .arg(request.dest.display().to_string());

    info!(url = %request.url, dest = %request.dest.display(), "cloning repository");
    self.git(clone, parent, env).await
  }
}

#[async_trait]
impl<R: CommandRunner> VcsFetcher for GitFetcher<R> {
  async fn update(&self, request: &CheckoutRequest, env: &EnvMap) -> Result<(), FetchError> {
    if !request.dest.join(".git").exists() {
      return self.clone_into(request, env).await;
    }

    let dest = request.dest.as_path();
    debug!(dest = %dest.display(), "updating existing checkout");
    match &request.revision {
      Some(rev) => {
        self
          .git(Invocation::new("git").args(["fetch", "--tags", "origin"]), dest, env)
          .await?;
        self.git(Invocation::new("git").arg("checkout").arg(rev), dest, env).await
      }
      None => {
        self
          .git(Invocation::new("git").args(["pull", "--ff-only"]), dest, env)
          .await
      }
    }
  }

  async fn fresh_checkout(&self, request: &CheckoutRequest, env: &EnvMap) -> Result<(), FetchError> {
    if request.dest.exists() {
      info!(dest = %request.dest.display(), "removing existing checkout");
      fs::remove_dir_all(&request.dest).await.map_err(|source| FetchError::Io {
        path: request.dest.clone(),
        source,
      })?;
    }
    self.clone_into(request, env).await
  }
}

/// HTTP downloads through reqwest.
#[derive(Debug, Clone, Default)]
pub struct HttpDownloader {
  client: reqwest::Client,
}

impl HttpDownloader {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Downloader for HttpDownloader {
  async fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
    info!(url = %url, dest = %dest.display(), "downloading");

    let http_err = |message: String| FetchError::Http {
      url: url.to_string(),
      message,
    };

    let response = self.client.get(url).send().await.map_err(|e| http_err(e.to_string()))?;
    if !response.status().is_success() {
      return Err(http_err(format!("HTTP {}", response.status())));
    }
    let bytes = response.bytes().await.map_err(|e| http_err(e.to_string()))?;

    if let Some(parent) = dest.parent() {
      fs::create_dir_all(parent).await.map_err(|source| FetchError::Io {
        path: parent.to_path_buf(),
        source,
      })?;
    }
    fs::write(dest, &bytes).await.map_err(|source| FetchError::Io {
      path: dest.to_path_buf(),
      source,
    })?;

    info!(dest = %dest.display(), size = bytes.len(), "download complete");
    Ok(())
  }
}

/// Size of a file in bytes, or `None` when it does not exist.
pub async fn file_size(path: &Path) -> Option<u64> {
  fs::metadata(path).await.ok().filter(|m| m.is_file()).map(|m| m.len())
}

/// Compute the SHA256 of a file as lowercase hex.
pub async fn hash_file(path: &Path) -> Result<String, std::io::Error> {
  let bytes = fs::read(path).await?;
  let mut hasher = Sha256::new();
  hasher.update(&bytes);
  Ok(hex::encode(hasher.finalize()))
}

/// The last path component of a URL, without query string or fragment.
///
/// Falls back to a name derived from the URL hash when the path ends in `/`.
pub fn url_file_name(url: &str) -> String {
  let path = url.split(['?', '#']).next().unwrap_or(url);
  match path.rsplit('/').next() {
    Some(name) if !name.is_empty() && name != "." && name != ".." => name.to_string(),
    _ => {
      let mut hasher = Sha256::new();
      hasher.update(url.as_bytes());
      format!("download_{}", &hex::encode(hasher.finalize())[..16])
    }
  }
}
