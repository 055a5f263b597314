//! Test doubles for the build collaborators.
//!
//! Every fake records what it was asked to do so tests can assert on the exact
//! commands, checkouts and downloads a state handler produced.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::build::{BuildContext, Progress, Reporter};
use crate::config::BuildConfig;
use crate::environment::EnvMap;
use crate::execute::{
  CheckoutRequest, CommandRunner, Downloader, ExecuteError, FetchError, Invocation, VcsFetcher,
};

/// A config rooted entirely inside `root`, with no extra arguments.
pub fn test_config(root: &Path) -> BuildConfig {
  BuildConfig {
    prefix: root.join("prefix"),
    checkout_root: root.join("src"),
    repository: None,
    no_network: false,
    no_build: false,
    always_configure: false,
    configure_args: Vec::new(),
    make_args: Vec::new(),
    lenient_archives: true,
  }
}

/// Write a gzip tarball containing `<top_dir>/configure` to `path`.
pub fn write_tarball(top_dir: &str, path: &Path) {
  let mut builder = tar::Builder::new(Vec::new());
  let content = b"#!/bin/sh\n";
  let mut header = tar::Header::new_gnu();
  header.set_size(content.len() as u64);
  header.set_mode(0o755);
  builder
    .append_data(&mut header, format!("{}/configure", top_dir), &content[..])
    .unwrap();
  let tar = builder.into_inner().unwrap();

  let file = std::fs::File::create(path).unwrap();
  let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
  encoder.write_all(&tar).unwrap();
  encoder.finish().unwrap();
}

/// Records invocations; commands starting with a registered prefix exit with 1.
#[derive(Debug, Default)]
pub struct FakeRunner {
  calls: Mutex<Vec<(String, PathBuf)>>,
  failing: Mutex<Vec<String>>,
}

impl FakeRunner {
  pub fn fail_on(&self, prefix: &str) {
    self.failing.lock().unwrap().push(prefix.to_string());
  }

  pub fn calls(&self) -> Vec<(String, PathBuf)> {
    self.calls.lock().unwrap().clone()
  }

  pub fn commands(&self) -> Vec<String> {
    self.calls().into_iter().map(|(command, _)| command).collect()
  }
}

#[async_trait]
impl CommandRunner for FakeRunner {
  async fn run(&self, invocation: &Invocation, cwd: &Path, _env: &EnvMap) -> Result<i32, ExecuteError> {
    let command = invocation.to_string();
    let fails = self.failing.lock().unwrap().iter().any(|p| command.starts_with(p.as_str()));
    self.calls.lock().unwrap().push((command, cwd.to_path_buf()));
    Ok(if fails { 1 } else { 0 })
  }
}

/// Creates the destination directory on success.
#[derive(Debug, Default)]
pub struct FakeFetcher {
  requests: Mutex<Vec<(&'static str, CheckoutRequest)>>,
  failing: AtomicBool,
}

impl FakeFetcher {
  pub fn fail(&self) {
    self.failing.store(true, Ordering::SeqCst);
  }

  pub fn requests(&self) -> Vec<(&'static str, CheckoutRequest)> {
    self.requests.lock().unwrap().clone()
  }

  fn fetch(&self, op: &'static str, request: &CheckoutRequest) -> Result<(), FetchError> {
    self.requests.lock().unwrap().push((op, request.clone()));
    if self.failing.load(Ordering::SeqCst) {
      return Err(FetchError::CommandFailed {
        command: format!("git {}", op),
        code: 128,
      });
    }
    std::fs::create_dir_all(&request.dest).map_err(|source| FetchError::Io {
      path: request.dest.clone(),
      source,
    })
  }
}

#[async_trait]
impl VcsFetcher for FakeFetcher {
  async fn update(&self, request: &CheckoutRequest, _env: &EnvMap) -> Result<(), FetchError> {
    self.fetch("update", request)
  }

  async fn fresh_checkout(&self, request: &CheckoutRequest, _env: &EnvMap) -> Result<(), FetchError> {
    self.fetch("fresh_checkout", request)
  }
}

/// Writes a fixed payload, or fails when none is set.
#[derive(Debug, Default)]
pub struct FakeDownloader {
  payload: Mutex<Option<Vec<u8>>>,
  urls: Mutex<Vec<String>>,
}

impl FakeDownloader {
  pub fn serve(&self, payload: Vec<u8>) {
    *self.payload.lock().unwrap() = Some(payload);
  }

  pub fn urls(&self) -> Vec<String> {
    self.urls.lock().unwrap().clone()
  }
}

#[async_trait]
impl Downloader for FakeDownloader {
  async fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
    self.urls.lock().unwrap().push(url.to_string());
    let payload = self.payload.lock().unwrap().clone();
    let Some(payload) = payload else {
      return Err(FetchError::Http {
        url: url.to_string(),
        message: "HTTP 404 Not Found".to_string(),
      });
    };
    if let Some(parent) = dest.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(dest, payload).unwrap();
    Ok(())
  }
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
  messages: Mutex<Vec<String>>,
}

impl RecordingReporter {
  pub fn messages(&self) -> Vec<String> {
    self.messages.lock().unwrap().clone()
  }
}

impl Reporter for RecordingReporter {
  fn report(&self, message: &str, _progress: Option<Progress>) {
    self.messages.lock().unwrap().push(message.to_string());
  }
}

/// One of each fake plus an empty environment.
#[derive(Debug, Default)]
pub struct FakeCollaborators {
  pub runner: FakeRunner,
  pub fetcher: FakeFetcher,
  pub downloader: FakeDownloader,
  pub reporter: RecordingReporter,
  pub env: EnvMap,
}

impl FakeCollaborators {
  pub fn context<'a>(&'a self, config: &'a BuildConfig) -> BuildContext<'a> {
    BuildContext {
      config,
      env: &self.env,
      runner: &self.runner,
      fetcher: &self.fetcher,
      downloader: &self.downloader,
      reporter: &self.reporter,
      progress: Progress::new(1, 1),
    }
  }
}
