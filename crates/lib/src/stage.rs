//! Artifact staging.
//!
//! Headers keep their path relative to the include directory they came from,
//! under `stage/include/<target>/`. Libraries are flattened into `stage/lib/`
//! by file name, so two libraries with the same name overwrite each other;
//! the later one wins and a warning is logged. A library already present in
//! `stage/lib/` from an earlier invocation counts when its content differs.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Layout;
use crate::consts::{HEADER_EXTENSIONS, LIBRARY_EXTENSIONS};

#[derive(Debug, Error)]
pub enum StageError {
  #[error("failed to walk {dir}: {source}")]
  Walk {
    dir: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to create {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to copy {from} to {to}: {source}")]
  Copy {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Staging directories with every placeholder resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedStaging {
  pub include_dirs: Vec<PathBuf>,
  pub library_dirs: Vec<PathBuf>,
}

/// A flattened library that replaced a different one. `previous` is the
/// earlier source when it was staged in this run, otherwise the staged file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
  pub file: PathBuf,
  pub previous: PathBuf,
  pub replacement: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
  pub headers: usize,
  pub libraries: usize,
  pub collisions: Vec<Collision>,
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
  path
    .extension()
    .map(|ext| ext.to_string_lossy().to_lowercase())
    .is_some_and(|ext| extensions.contains(&ext.as_str()))
}

/// Copies artifacts into the stage tree and remembers which source produced
/// each flattened library during this run.
#[derive(Debug)]
pub struct Stager<'a> {
  layout: &'a Layout,
  libraries: HashMap<OsString, PathBuf>,
}

impl<'a> Stager<'a> {
  pub fn new(layout: &'a Layout) -> Self {
    Self {
      layout,
      libraries: HashMap::new(),
    }
  }

  /// Stage `rule` for `target`. Directories that do not exist are skipped.
  pub fn stage(&mut self, target: &str, rule: &ResolvedStaging) -> Result<StageReport, StageError> {
    let mut report = StageReport::default();

    let include_root = self.layout.stage_include(target);
    for dir in &rule.include_dirs {
      for file in matching_files(dir, HEADER_EXTENSIONS)? {
        let relative = file.strip_prefix(dir).unwrap_or(&file);
        copy(&file, &include_root.join(relative))?;
        report.headers += 1;
      }
    }

    let lib_root = self.layout.stage_lib();
    for dir in &rule.library_dirs {
      for file in matching_files(dir, LIBRARY_EXTENSIONS)? {
        let Some(name) = file.file_name().map(|n| n.to_os_string()) else {
          continue;
        };
        let dest = lib_root.join(&name);
        let previous = match self.libraries.get(&name) {
          Some(previous) => (*previous != file).then(|| previous.clone()),
          None if dest.is_file() && !same_content(&dest, &file)? => Some(dest.clone()),
          None => None,
        };
        if let Some(previous) = previous {
          warn!(
            file = %dest.display(),
            previous = %previous.display(),
            replacement = %file.display(),
            "staged library overwritten"
          );
          report.collisions.push(Collision {
            file: dest.clone(),
            previous,
            replacement: file.clone(),
          });
        }
        copy(&file, &dest)?;
        self.libraries.insert(name, file);
        report.libraries += 1;
      }
    }

    info!(
      target_name = %target,
      headers = report.headers,
      libraries = report.libraries,
      "staged"
    );

    Ok(report)
  }
}

fn matching_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, StageError> {
  if !dir.is_dir() {
    debug!(dir = %dir.display(), "staging directory missing, skipped");
    return Ok(Vec::new());
  }

  let mut files = Vec::new();
  for entry in WalkDir::new(dir).sort_by_file_name() {
    let entry = entry.map_err(|source| StageError::Walk {
      dir: dir.to_path_buf(),
      source,
    })?;
    if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
      files.push(entry.into_path());
    }
  }
  Ok(files)
}

fn same_content(a: &Path, b: &Path) -> Result<bool, StageError> {
  let read = |path: &Path| {
    std::fs::read(path).map_err(|source| StageError::Read {
      path: path.to_path_buf(),
      source,
    })
  };
  Ok(read(a)? == read(b)?)
}

fn copy(from: &Path, to: &Path) -> Result<(), StageError> {
  if let Some(parent) = to.parent() {
    std::fs::create_dir_all(parent).map_err(|source| StageError::CreateDir {
      path: parent.to_path_buf(),
      source,
    })?;
  }
  std::fs::copy(from, to).map_err(|source| StageError::Copy {
    from: from.to_path_buf(),
    to: to.to_path_buf(),
    source,
  })?;
  debug!(from = %from.display(), to = %to.display(), "installing");
  Ok(())
}
