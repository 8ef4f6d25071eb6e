//! Source patching through the external `patch` tool.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ConfigError, Tool, Tools};
use crate::process::{ProcessError, ToolCommand};

#[derive(Debug, Error)]
pub enum PatchError {
  #[error(transparent)]
  Tool(#[from] ConfigError),

  #[error("patch file not found: {0}")]
  PatchMissing(PathBuf),

  #[error("failed to apply {patch} to {file}: {source}")]
  Failed {
    file: PathBuf,
    patch: PathBuf,
    #[source]
    source: ProcessError,
  },
}

/// A patch with absolute paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPatch {
  pub file: PathBuf,
  pub patch: PathBuf,
  pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchOutcome {
  Applied,
  /// An optional patch did not apply (often: already applied by an earlier run).
  Skipped,
}

/// `patch -N <file> <patch>`, run from the file's directory.
pub fn patch_command(program: &Path, patch: &ResolvedPatch) -> ToolCommand {
  let cwd = patch.file.parent().unwrap_or(Path::new("."));
  ToolCommand::new(program, cwd)
    .arg("-N")
    .arg(patch.file.to_string_lossy())
    .arg(patch.patch.to_string_lossy())
}

/// Apply one patch. Failures of optional patches are logged and swallowed.
pub async fn apply_patch(tools: &Tools, patch: &ResolvedPatch) -> Result<PatchOutcome, PatchError> {
  if !patch.patch.is_file() {
    if patch.required {
      return Err(PatchError::PatchMissing(patch.patch.clone()));
    }
    warn!(file = %patch.file.display(), patch = %patch.patch.display(), "optional patch file missing");
    return Ok(PatchOutcome::Skipped);
  }
  let program = tools.locate(Tool::Patch)?;

  debug!(file = %patch.file.display(), patch = %patch.patch.display(), required = patch.required, "patching");

  match patch_command(&program, patch).run().await {
    Ok(()) => Ok(PatchOutcome::Applied),
    Err(source) if patch.required => Err(PatchError::Failed {
      file: patch.file.clone(),
      patch: patch.patch.clone(),
      source,
    }),
    Err(err) => {
      warn!(
        file = %patch.file.display(),
        patch = %patch.patch.display(),
        error = %err,
        "optional patch not applied"
      );
      Ok(PatchOutcome::Skipped)
    }
  }
}
