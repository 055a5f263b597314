//! Release-archive modules: download, unpack, patch, build, install.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::build::BuildContext;
use crate::config::BuildConfig;
use crate::execute::fetch::{file_size, hash_file, url_file_name};
use crate::execute::{Invocation, unpack_archive};

use super::{BuildState, ModuleError, Transition, run_build, run_install};

const ARCHIVE_SUFFIXES: &[&str] = &[".tar.gz", ".tar.bz2", ".tgz"];

/// A patch applied inside the extracted tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Patch {
  pub path: PathBuf,
  /// Leading path components stripped, as in `patch -p<N>`.
  pub strip: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TarballSource {
  pub version: String,
  pub url: String,
  /// Expected size of the archive in bytes.
  pub size: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sha256: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub patches: Vec<Patch>,
}

impl TarballSource {
  pub fn new(version: impl Into<String>, url: impl Into<String>, size: u64) -> Self {
    Self {
      version: version.into(),
      url: url.into(),
      size,
      sha256: None,
      patches: Vec::new(),
    }
  }

  /// Local path the archive is downloaded to.
  pub fn archive_path(&self, config: &BuildConfig) -> PathBuf {
    config.checkout_root.join(url_file_name(&self.url))
  }

  pub fn build_dir(&self, config: &BuildConfig) -> PathBuf {
    config.checkout_root.join(archive_dir_name(&self.url))
  }
}

/// Name of the directory an archive extracts to.
///
/// `.tar.gz`, `.tar.bz2` and `.tgz` are stripped from the URL's file name.
/// Any other name is returned unchanged.
pub fn archive_dir_name(url: &str) -> String {
  let name = url_file_name(url);
  ARCHIVE_SUFFIXES
    .iter()
    .find_map(|suffix| name.strip_suffix(suffix))
    .map(str::to_string)
    .unwrap_or(name)
}

pub(super) async fn run_state(
  name: &str,
  source: &TarballSource,
  ctx: &BuildContext<'_>,
  state: BuildState,
) -> Transition {
  let config = ctx.config;
  let build_dir = source.build_dir(config);

  match state {
    BuildState::Start => Transition::to(BuildState::Download),

    BuildState::Download => {
      let failed_next = if config.lenient_archives {
        BuildState::Unpack
      } else {
        BuildState::Download
      };
      match download(source, ctx).await {
        Ok(()) => Transition::to(BuildState::Unpack),
        Err(message) => Transition::failed(failed_next, ModuleError::Fetch(message)),
      }
    }

    BuildState::Unpack => {
      ctx.report(&format!("unpacking {}", name));
      let failed_next = if config.lenient_archives {
        BuildState::Patch
      } else {
        BuildState::Unpack
      };

      let archive = source.archive_path(config);
      if let Err(e) = unpack_archive(&archive, &config.checkout_root).await {
        return Transition::failed(failed_next, ModuleError::Unpack(e.to_string()));
      }
      if !build_dir.is_dir() {
        return Transition::failed(
          failed_next,
          ModuleError::Unpack(format!("{} was not created", build_dir.display())),
        );
      }
      Transition::to(BuildState::Patch)
    }

    BuildState::Patch => {
      let next = if config.no_build {
        BuildState::Done
      } else {
        BuildState::Build
      };
      for patch in &source.patches {
        ctx.report(&format!("applying patch {}", patch.path.display()));
        let invocation = Invocation::new("patch")
          .arg(format!("-p{}", patch.strip))
          .arg("-i")
          .arg(patch.path.display().to_string());
        if let Err(message) = ctx.run_command(&invocation, &build_dir).await {
          return Transition::failed(next, ModuleError::Patch(message));
        }
      }
      Transition::to(next)
    }

    BuildState::Build => run_build(name, &build_dir, ctx, &[]).await,
    BuildState::Install => run_install(name, &build_dir, ctx).await,

    other => Transition::failed(other, ModuleError::UnsupportedState(other)),
  }
}

/// Make sure a complete archive is on disk, fetching it when allowed.
///
/// An archive that is missing, of the wrong size or with the wrong checksum is
/// fetched again.
async fn download(source: &TarballSource, ctx: &BuildContext<'_>) -> Result<(), String> {
  let archive = source.archive_path(ctx.config);

  if !ctx.config.no_network
    && let Err(reason) = verify_archive(source, &archive).await
  {
    debug!(archive = %archive.display(), reason = %reason, "archive needs fetching");
    ctx.report(&format!("downloading {}", source.url));
    if let Err(e) = ctx.downloader.download(&source.url, &archive).await {
      return Err(e.to_string());
    }
  }

  verify_archive(source, &archive).await
}

/// Check the archive's size and, when declared, its sha256.
async fn verify_archive(source: &TarballSource, archive: &Path) -> Result<(), String> {
  match file_size(archive).await {
    None => return Err(format!("{} is missing", archive.display())),
    Some(size) if size != source.size => {
      return Err(format!(
        "{} is {} bytes, expected {}",
        archive.display(),
        size,
        source.size
      ));
    }
    Some(_) => {}
  }

  if let Some(expected) = &source.sha256 {
    let actual = hash_file(archive)
      .await
      .map_err(|e| format!("could not hash {}: {}", archive.display(), e))?;
    if !actual.eq_ignore_ascii_case(expected) {
      warn!(archive = %archive.display(), expected = %expected, actual = %actual, "checksum mismatch");
      return Err(format!("{} has sha256 {}, expected {}", archive.display(), actual, expected));
    }
  }

  Ok(())
}
