//! Idempotent source archive extraction.
//!
//! Supports:
//! - `.zip`
//! - `.tar.gz` / `.tgz`
//! - `.tar.bz2` / `.tbz2`
//! - `.tar`

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, info, warn};

use super::AcquireError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
  Zip,
  TarGz,
  TarBz2,
  Tar,
}

impl ArchiveKind {
  /// Reader chosen from the file name, case-insensitively.
  pub fn detect(path: &Path) -> Option<Self> {
    let name = path.file_name()?.to_string_lossy().to_lowercase();
    if name.ends_with(".zip") {
      Some(ArchiveKind::Zip)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
      Some(ArchiveKind::TarGz)
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
      Some(ArchiveKind::TarBz2)
    } else if name.ends_with(".tar") {
      Some(ArchiveKind::Tar)
    } else {
      None
    }
  }
}

/// An archive under `pkgs/` and where it unpacks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
  pub archive: PathBuf,
  /// Extraction destination, `build/<target>`.
  pub dest: PathBuf,
  /// Top-level folder the archive is expected to create inside `dest`.
  pub folder: String,
}

impl Package {
  pub fn source_dir(&self) -> PathBuf {
    self.dest.join(&self.folder)
  }
}

/// Extract `package` unless its source folder already exists.
///
/// Returns `true` when an extraction actually happened. An existing folder
/// is trusted as-is; partially extracted trees are not detected.
pub fn extract(package: &Package) -> Result<bool, AcquireError> {
  let source_dir = package.source_dir();
  if source_dir.exists() {
    debug!(path = %source_dir.display(), "sources already extracted");
    return Ok(false);
  }

  if !package.archive.is_file() {
    return Err(AcquireError::ArchiveMissing(package.archive.clone()));
  }
  let kind =
    ArchiveKind::detect(&package.archive).ok_or_else(|| AcquireError::UnsupportedArchive(package.archive.clone()))?;

  let io_err = |source| AcquireError::Extract {
    archive: package.archive.clone(),
    source,
  };

  fs::create_dir_all(&package.dest).map_err(io_err)?;
  let file = BufReader::new(File::open(&package.archive).map_err(io_err)?);

  info!(archive = %package.archive.display(), dest = %package.dest.display(), "extracting");

  match kind {
    ArchiveKind::Zip => unpack_zip(file, &package.dest).map_err(|source| AcquireError::Zip {
      archive: package.archive.clone(),
      source,
    })?,
    ArchiveKind::TarGz => unpack_tar(GzDecoder::new(file), &package.dest).map_err(io_err)?,
    ArchiveKind::TarBz2 => unpack_tar(BzDecoder::new(file), &package.dest).map_err(io_err)?,
    ArchiveKind::Tar => unpack_tar(file, &package.dest).map_err(io_err)?,
  }

  if !source_dir.exists() {
    warn!(
      archive = %package.archive.display(),
      folder = %package.folder,
      "archive did not create the expected folder"
    );
  }

  Ok(true)
}

fn unpack_tar<R: Read>(reader: R, dest: &Path) -> std::io::Result<()> {
  let mut archive = Archive::new(reader);
  archive.set_preserve_mtime(true);
  archive.unpack(dest)
}

fn unpack_zip(reader: BufReader<File>, dest: &Path) -> zip::result::ZipResult<()> {
  let mut archive = zip::ZipArchive::new(reader)?;
  archive.extract(dest)
}
