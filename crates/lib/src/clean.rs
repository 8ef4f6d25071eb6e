//! Removal of the build and stage trees.
//!
//! Cleaning deletes every marker together with everything else below
//! `build/`, so the next run starts again from the archives.

use std::path::{Path, PathBuf};
use std::{fs, io};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::Layout;

#[derive(Debug, Error)]
pub enum CleanError {
  #[error("failed to delete {path}: {source}")]
  Delete {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Default, Serialize)]
pub struct CleanReport {
  pub deleted_paths: Vec<PathBuf>,
  pub bytes_freed: u64,
}

fn dir_size(path: &Path) -> u64 {
  WalkDir::new(path)
    .into_iter()
    .filter_map(|e| e.ok())
    .filter(|e| e.file_type().is_file())
    .filter_map(|e| e.metadata().ok())
    .map(|m| m.len())
    .sum()
}

/// Delete `build/` and `stage/`. Missing trees are not an error.
pub fn clean(layout: &Layout) -> Result<CleanReport, CleanError> {
  let mut report = CleanReport::default();

  for tree in [&layout.build, &layout.stage] {
    if !tree.exists() {
      debug!(path = %tree.display(), "nothing to remove");
      continue;
    }

    let size = dir_size(tree);
    fs::remove_dir_all(tree).map_err(|source| CleanError::Delete {
      path: tree.clone(),
      source,
    })?;
    debug!(path = %tree.display(), bytes = size, "removed");

    report.bytes_freed += size;
    report.deleted_paths.push(tree.clone());
  }

  info!(
    deleted = report.deleted_paths.len(),
    bytes_freed = report.bytes_freed,
    "clean complete"
  );

  Ok(report)
}
