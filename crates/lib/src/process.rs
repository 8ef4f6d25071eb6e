//! External tool invocation.
//!
//! Every subprocess (cmake, make, msbuild, patch, generated scripts) goes
//! through [`ToolCommand`]. The child inherits the parent's environment and
//! stdio, so tool diagnostics reach the terminal unmodified; only the exit
//! status is inspected.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("{program} exited with {}", exit_description(.code))]
  Failed { program: String, code: Option<i32> },

  #[error("cannot extend {var}: {source}")]
  Env {
    var: String,
    #[source]
    source: std::env::JoinPathsError,
  },
}

fn exit_description(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("exit code {code}"),
    None => "no exit code (terminated by signal)".to_string(),
  }
}

/// A single blocking-to-completion tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
  program: PathBuf,
  args: Vec<String>,
  cwd: PathBuf,
  set: Vec<(String, OsString)>,
  remove: Vec<String>,
  append: Vec<(String, PathBuf)>,
}

impl ToolCommand {
  pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: cwd.into(),
      set: Vec::new(),
      remove: Vec::new(),
      append: Vec::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn env(mut self, var: &str, value: impl Into<OsString>) -> Self {
    self.set.push((var.to_string(), value.into()));
    self
  }

  pub fn env_remove(mut self, var: &str) -> Self {
    self.remove.push(var.to_string());
    self
  }

  /// Append `dir` to a search-path style variable (`PATH`,
  /// `LD_LIBRARY_PATH`), keeping whatever the parent already had.
  pub fn append_path(mut self, var: &str, dir: impl Into<PathBuf>) -> Self {
    self.append.push((var.to_string(), dir.into()));
    self
  }

  pub fn get_args(&self) -> &[String] {
    &self.args
  }

  pub fn cwd(&self) -> &Path {
    &self.cwd
  }

  /// Human-readable command line, for logs and dry runs.
  pub fn command_line(&self) -> String {
    std::iter::once(self.program.display().to_string())
      .chain(self.args.iter().map(|arg| {
        if arg.contains(' ') {
          format!("\"{arg}\"")
        } else {
          arg.clone()
        }
      }))
      .collect::<Vec<_>>()
      .join(" ")
  }

  fn display_name(&self) -> String {
    self
      .program
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_else(|| self.program.display().to_string())
  }

  /// Environment changes relative to the parent process.
  fn env_changes(&self) -> Result<Vec<(String, OsString)>, ProcessError> {
    let mut changes: Vec<(String, OsString)> = self.set.clone();

    for (var, dir) in &self.append {
      let current = changes
        .iter()
        .rev()
        .find(|(name, _)| name == var)
        .map(|(_, value)| value.clone())
        .or_else(|| std::env::var_os(var));
      let mut paths: Vec<PathBuf> = current
        .as_deref()
        .map(|value| std::env::split_paths(value).filter(|p| !p.as_os_str().is_empty()).collect())
        .unwrap_or_default();
      paths.push(dir.clone());
      let joined = std::env::join_paths(paths).map_err(|source| ProcessError::Env {
        var: var.clone(),
        source,
      })?;
      changes.push((var.clone(), joined));
    }

    Ok(changes)
  }

  /// Run to completion. A non-zero exit is an error.
  pub async fn run(&self) -> Result<(), ProcessError> {
    let program = self.display_name();
    info!(cmd = %self.command_line(), "executing command");

    let mut command = Command::new(&self.program);
    command.args(&self.args).current_dir(&self.cwd);
    for var in &self.remove {
      command.env_remove(var);
    }
    for (var, value) in self.env_changes()? {
      debug!(var = %var, value = ?value, "environment override");
      command.env(var, value);
    }

    debug!(working_dir = ?self.cwd, "spawning process");

    let status = command.status().await.map_err(|source| ProcessError::Spawn {
      program: program.clone(),
      source,
    })?;

    if !status.success() {
      return Err(ProcessError::Failed {
        program,
        code: status.code(),
      });
    }

    Ok(())
  }
}
