//! Archive extraction.
//!
//! Supports:
//! - `*.bz2` tarballs (bzip2)
//! - everything else as gzip tarballs

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use tar::Archive;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum UnpackError {
  #[error("failed to open archive {path}: {source}")]
  Open {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to extract {path}: {source}")]
  Extract {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("extraction of {0} was interrupted")]
  Interrupted(PathBuf),
}

/// Compression applied to a tarball, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
  Bzip2,
  Gzip,
}

impl Compression {
  pub fn for_path(path: &Path) -> Self {
    match path.extension().and_then(|e| e.to_str()) {
      Some("bz2") => Compression::Bzip2,
      _ => Compression::Gzip,
    }
  }
}

/// Extract `archive` into `dest`, keeping the archive's own top-level directory.
pub async fn unpack_archive(archive: &Path, dest: &Path) -> Result<(), UnpackError> {
  let archive = archive.to_path_buf();
  let dest = dest.to_path_buf();
  let interrupted = archive.clone();

  tokio::task::spawn_blocking(move || unpack_blocking(&archive, &dest))
    .await
    .map_err(|_| UnpackError::Interrupted(interrupted))?
}

fn unpack_blocking(archive: &Path, dest: &Path) -> Result<(), UnpackError> {
  let file = File::open(archive).map_err(|source| UnpackError::Open {
    path: archive.to_path_buf(),
    source,
  })?;
  let reader = BufReader::new(file);

  let decoder: Box<dyn Read> = match Compression::for_path(archive) {
    Compression::Bzip2 => Box::new(BzDecoder::new(reader)),
    Compression::Gzip => Box::new(GzDecoder::new(reader)),
  };

  Archive::new(decoder).unpack(dest).map_err(|source| UnpackError::Extract {
    path: archive.to_path_buf(),
    source,
  })?;

  info!(archive = %archive.display(), dest = %dest.display(), "unpacked archive");
  Ok(())
}
