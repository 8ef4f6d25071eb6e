//! Source acquisition and preparation.
//!
//! Acquisition turns a recipe [`Source`](crate::recipe::Source) into a source
//! directory on disk: extracting an archive, or checking that a checkout or
//! prebuilt tree exists. Preparation then runs the recipe's prepare steps
//! (patches and appended lines) against that directory.

pub mod archive;
pub mod patch;

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::placeholder::{PlaceholderError, Resolver, substitute};
use crate::recipe::{Condition, PrepareAction, PrepareStep, Trigger};

pub use archive::{ArchiveKind, Package, extract};
pub use patch::{PatchError, PatchOutcome, ResolvedPatch, apply_patch};

#[derive(Debug, Error)]
pub enum AcquireError {
  #[error("archive not found: {0}")]
  ArchiveMissing(PathBuf),

  #[error("unsupported archive type: {0}")]
  UnsupportedArchive(PathBuf),

  #[error("failed to extract {archive}: {source}")]
  Extract {
    archive: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to extract {archive}: {source}")]
  Zip {
    archive: PathBuf,
    #[source]
    source: zip::result::ZipError,
  },

  #[error("source tree not found: {0} (clone it there first)")]
  CheckoutMissing(PathBuf),

  #[error("prebuilt directory not found: {0}")]
  PrebuiltMissing(PathBuf),

  #[error(transparent)]
  Patch(#[from] PatchError),

  #[error("failed to append to {file}: {source}")]
  AppendLine {
    file: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Placeholder(#[from] PlaceholderError),
}

/// A recipe source with every path resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
  Archive(Package),
  Checkout(PathBuf),
  Prebuilt(PathBuf),
}

impl ResolvedSource {
  /// Where the sources live once acquired.
  pub fn source_dir(&self) -> PathBuf {
    match self {
      ResolvedSource::Archive(package) => package.source_dir(),
      ResolvedSource::Checkout(path) | ResolvedSource::Prebuilt(path) => path.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquired {
  pub source_dir: PathBuf,
  /// An archive was extracted by this call.
  pub extracted: bool,
}

/// Make the sources for one target available.
pub fn acquire(source: &ResolvedSource) -> Result<Acquired, AcquireError> {
  let extracted = match source {
    ResolvedSource::Archive(package) => extract(package)?,
    ResolvedSource::Checkout(path) => {
      if !path.is_dir() {
        return Err(AcquireError::CheckoutMissing(path.clone()));
      }
      false
    }
    ResolvedSource::Prebuilt(path) => {
      if !path.is_dir() {
        return Err(AcquireError::PrebuiltMissing(path.clone()));
      }
      false
    }
  };

  Ok(Acquired {
    source_dir: source.source_dir(),
    extracted,
  })
}

/// What a single prepare step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
  Patched { file: PathBuf, outcome: PatchOutcome },
  Appended { file: PathBuf },
  NotApplicable,
}

fn applies(step: &PrepareStep, config: &Config, extracted: bool) -> bool {
  let triggered = match step.trigger {
    Trigger::Extracted => extracted,
    Trigger::Always => true,
  };
  let condition = match step.condition {
    Condition::Always => true,
    Condition::CustomToolchain => config.toolchain.is_custom(),
  };
  triggered && condition
}

/// Run `steps` against `source_dir`, in order, stopping on the first error.
pub async fn prepare(
  config: &Config,
  steps: &[PrepareStep],
  acquired: &Acquired,
  resolver: &impl Resolver,
) -> Result<Vec<StepOutcome>, AcquireError> {
  let mut outcomes = Vec::with_capacity(steps.len());

  for step in steps {
    if !applies(step, config, acquired.extracted) {
      outcomes.push(StepOutcome::NotApplicable);
      continue;
    }

    let outcome = match &step.action {
      PrepareAction::Patch(patch) => {
        let resolved = ResolvedPatch {
          file: acquired.source_dir.join(&patch.file),
          patch: config.layout.patch_path(&patch.patch),
          required: patch.required,
        };
        let outcome = apply_patch(&config.tools, &resolved).await?;
        StepOutcome::Patched {
          file: resolved.file,
          outcome,
        }
      }
      PrepareAction::AppendLine { file, line } => {
        let path = acquired.source_dir.join(file);
        let line = substitute(line, resolver)?;
        append_line(&path, &line)?;
        StepOutcome::Appended { file: path }
      }
    };
    outcomes.push(outcome);
  }

  let applied = outcomes.iter().filter(|o| **o != StepOutcome::NotApplicable).count();
  if applied > 0 {
    info!(steps = applied, source = %acquired.source_dir.display(), "prepared sources");
  }

  Ok(outcomes)
}

fn append_line(path: &Path, line: &str) -> Result<(), AcquireError> {
  let map_err = |source| AcquireError::AppendLine {
    file: path.to_path_buf(),
    source,
  };
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).map_err(map_err)?;
  }
  let mut file = std::fs::OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .map_err(map_err)?;
  writeln!(file, "{line}").map_err(map_err)?;
  debug!(file = %path.display(), line = %line, "appended line");
  Ok(())
}
