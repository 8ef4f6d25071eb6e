//! Static recipe data.
//!
//! A [`Recipe`] describes how to acquire, prepare, build and stage one
//! target. Recipes never touch the filesystem themselves; path-like strings
//! carry placeholders (see [`crate::placeholder`]) that the engine resolves
//! right before the target runs.

pub mod catalog;
pub mod registry;

use std::collections::BTreeMap;

use serde::Serialize;

pub use registry::{Registry, RegistryError};

/// Where a target's sources come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
  /// `pkgs/<archive>`, extracted into `build/<target>/`; the sources end up
  /// in `build/<target>/<folder>`.
  Archive { archive: String, folder: String },

  /// An existing source tree (placeholders allowed, e.g. `$${root}/USD`).
  Checkout { path: String },

  /// A directory of prebuilt artifacts that is staged as-is.
  Prebuilt { path: String },
}

impl Source {
  pub fn archive(archive: &str, folder: &str) -> Self {
    Source::Archive {
      archive: archive.to_string(),
      folder: folder.to_string(),
    }
  }

  pub fn checkout(path: &str) -> Self {
    Source::Checkout { path: path.to_string() }
  }

  pub fn prebuilt(path: &str) -> Self {
    Source::Prebuilt { path: path.to_string() }
  }
}

/// When a prepare step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
  /// Only right after the archive was actually extracted.
  Extracted,
  /// Every time the target builds.
  Always,
}

/// Extra precondition for a prepare step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
  Always,
  /// Only when a custom toolchain root is configured.
  CustomToolchain,
}

/// A source patch applied with the external patch tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Patch {
  /// File to patch, relative to the target's source directory.
  pub file: String,
  /// Patch file, relative to `patches/`.
  pub patch: String,
  /// A failing required patch aborts the pipeline; optional ones are ignored.
  pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrepareAction {
  Patch(Patch),
  /// Append one line to a file below the source directory.
  AppendLine { file: String, line: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrepareStep {
  pub action: PrepareAction,
  pub trigger: Trigger,
  pub condition: Condition,
}

impl PrepareStep {
  /// A required patch applied once, after extraction.
  pub fn patch_after_extract(file: &str, patch: &str) -> Self {
    Self {
      action: PrepareAction::Patch(Patch {
        file: file.to_string(),
        patch: patch.to_string(),
        required: true,
      }),
      trigger: Trigger::Extracted,
      condition: Condition::Always,
    }
  }

  /// An optional patch attempted on every build.
  pub fn optional_patch(file: &str, patch: &str) -> Self {
    Self {
      action: PrepareAction::Patch(Patch {
        file: file.to_string(),
        patch: patch.to_string(),
        required: false,
      }),
      trigger: Trigger::Always,
      condition: Condition::Always,
    }
  }

  pub fn append_line(file: &str, line: &str) -> Self {
    Self {
      action: PrepareAction::AppendLine {
        file: file.to_string(),
        line: line.to_string(),
      },
      trigger: Trigger::Extracted,
      condition: Condition::Always,
    }
  }

  pub fn when(mut self, condition: Condition) -> Self {
    self.condition = condition;
    self
  }
}

/// Build configuration handed to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Configuration {
  #[default]
  Release,
  RelWithDebInfo,
}

impl Configuration {
  pub fn as_str(&self) -> &'static str {
    match self {
      Configuration::Release => "Release",
      Configuration::RelWithDebInfo => "RelWithDebInfo",
    }
  }
}

/// Generator + native build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CMakeBuild {
  /// Source directory to configure; `$${src}` when empty.
  pub source: Option<String>,
  pub flags: BTreeMap<String, String>,
  /// Sub-projects built one after another.
  pub projects: Vec<String>,
  pub configuration: Configuration,
}

/// Direct make invocation with a single top-level target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MakeBuild {
  /// Directory make runs in.
  pub dir: String,
  pub target: String,
}

/// Templated build-driver script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptBuild {
  /// Template path relative to `patches/`.
  pub template: String,
  /// File name of the generated script inside the source directory.
  pub script_name: String,
  /// Token name -> value (placeholders allowed).
  pub tokens: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backend {
  CMake(CMakeBuild),
  Make(MakeBuild),
  Script(ScriptBuild),
  /// Nothing to build; the source is staged directly.
  None,
}

impl Backend {
  pub fn cmake<I, S>(projects: I) -> CMakeBuild
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    CMakeBuild {
      projects: projects.into_iter().map(Into::into).collect(),
      ..CMakeBuild::default()
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Backend::CMake(_) => "cmake",
      Backend::Make(_) => "make",
      Backend::Script(_) => "script",
      Backend::None => "none",
    }
  }
}

impl CMakeBuild {
  pub fn flag(mut self, name: &str, value: &str) -> Self {
    self.flags.insert(name.to_string(), value.to_string());
    self
  }

  pub fn flags<'a>(mut self, flags: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
    for (name, value) in flags {
      self.flags.insert(name.to_string(), value.to_string());
    }
    self
  }

  pub fn source(mut self, source: &str) -> Self {
    self.source = Some(source.to_string());
    self
  }

  pub fn configuration(mut self, configuration: Configuration) -> Self {
    self.configuration = configuration;
    self
  }
}

impl From<CMakeBuild> for Backend {
  fn from(build: CMakeBuild) -> Self {
    Backend::CMake(build)
  }
}

/// Directories whose headers and libraries are copied into `stage/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StagingRule {
  pub include_dirs: Vec<String>,
  pub library_dirs: Vec<String>,
}

impl StagingRule {
  pub fn new<I, L>(include_dirs: I, library_dirs: L) -> Self
  where
    I: IntoIterator<Item = &'static str>,
    L: IntoIterator<Item = &'static str>,
  {
    Self {
      include_dirs: include_dirs.into_iter().map(str::to_string).collect(),
      library_dirs: library_dirs.into_iter().map(str::to_string).collect(),
    }
  }
}

/// Everything the engine needs to know about one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipe {
  pub name: String,
  /// Targets whose request also triggers this one.
  pub dependents: Vec<String>,
  /// Declared prerequisites; only consulted in transitive trigger mode and
  /// for ordering validation.
  pub requires: Vec<String>,
  pub exclude_from_all: bool,
  pub source: Source,
  pub prepare: Vec<PrepareStep>,
  pub backend: Backend,
  pub staging: StagingRule,
}

impl Recipe {
  pub fn new(name: &str, source: Source) -> Self {
    Self {
      name: name.to_string(),
      dependents: Vec::new(),
      requires: Vec::new(),
      exclude_from_all: false,
      source,
      prepare: Vec::new(),
      backend: Backend::None,
      staging: StagingRule::default(),
    }
  }

  pub fn dependents(mut self, names: &[&str]) -> Self {
    self.dependents = names.iter().map(|n| n.to_string()).collect();
    self
  }

  pub fn requires(mut self, names: &[&str]) -> Self {
    self.requires = names.iter().map(|n| n.to_string()).collect();
    self
  }

  pub fn exclude_from_all(mut self) -> Self {
    self.exclude_from_all = true;
    self
  }

  pub fn prepare(mut self, step: PrepareStep) -> Self {
    self.prepare.push(step);
    self
  }

  pub fn backend(mut self, backend: impl Into<Backend>) -> Self {
    self.backend = backend.into();
    self
  }

  pub fn staging(mut self, staging: StagingRule) -> Self {
    self.staging = staging;
    self
  }

  /// Every string in the recipe that may carry placeholders.
  pub(crate) fn templated_strings(&self) -> Vec<&str> {
    let mut strings: Vec<&str> = Vec::new();
    match &self.source {
      Source::Archive { .. } => {}
      Source::Checkout { path } | Source::Prebuilt { path } => strings.push(path),
    }
    for step in &self.prepare {
      if let PrepareAction::AppendLine { line, .. } = &step.action {
        strings.push(line);
      }
    }
    match &self.backend {
      Backend::CMake(build) => {
        strings.extend(build.source.as_deref());
        strings.extend(build.flags.values().map(String::as_str));
      }
      Backend::Make(build) => strings.push(&build.dir),
      Backend::Script(build) => strings.extend(build.tokens.values().map(String::as_str)),
      Backend::None => {}
    }
    strings.extend(self.staging.include_dirs.iter().map(String::as_str));
    strings.extend(self.staging.library_dirs.iter().map(String::as_str));
    strings
  }
}
