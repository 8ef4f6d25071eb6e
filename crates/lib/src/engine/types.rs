//! Error and report types for engine runs.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::acquire::{AcquireError, StepOutcome};
use crate::backend::BackendError;
use crate::config::TriggerMode;
use crate::placeholder::PlaceholderError;
use crate::stage::{StageError, StageReport};

/// Pipeline stage of a single target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
  Acquire,
  Prepare,
  Build,
  Stage,
  Mark,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Stage::Acquire => "acquire",
      Stage::Prepare => "prepare",
      Stage::Build => "build",
      Stage::Stage => "stage",
      Stage::Mark => "mark",
    };
    f.write_str(name)
  }
}

/// The underlying cause of a failed stage.
#[derive(Debug, Error)]
pub enum StageFailure {
  #[error(transparent)]
  Placeholder(#[from] PlaceholderError),

  #[error(transparent)]
  Acquire(#[from] AcquireError),

  #[error(transparent)]
  Backend(#[from] BackendError),

  #[error(transparent)]
  Stage(#[from] StageError),

  #[error("failed to write marker: {0}")]
  Mark(#[from] std::io::Error),
}

/// A target pipeline that stopped. Nothing after it runs.
#[derive(Debug, Error)]
#[error("{target}: {stage} failed: {source}")]
pub struct BuildError {
  pub target: String,
  pub stage: Stage,
  #[source]
  pub source: StageFailure,
}

/// What happened to one target that was built.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
  pub name: String,
  pub source_dir: PathBuf,
  pub extracted: bool,
  pub prepared: Vec<StepOutcome>,
  pub staged: StageReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub request: String,
  pub trigger: TriggerMode,
  /// Targets built by this run, in processing order.
  pub built: Vec<TargetReport>,
  /// Selected targets skipped because their marker exists.
  pub up_to_date: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
  Build,
  UpToDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedTarget {
  pub name: String,
  pub status: PlanStatus,
  pub backend: &'static str,
  /// Resolved only for targets that would build.
  pub source_dir: Option<PathBuf>,
  pub commands: Vec<String>,
}

/// Dry-run result: what a run would do, without touching the filesystem.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
  pub request: String,
  pub trigger: TriggerMode,
  pub targets: Vec<PlannedTarget>,
  pub not_selected: Vec<String>,
}

impl Plan {
  pub fn to_build(&self) -> impl Iterator<Item = &PlannedTarget> {
    self.targets.iter().filter(|t| t.status == PlanStatus::Build)
  }
}
