//! Which targets run, and completion markers.
//!
//! A target is done when `build/<name>/.<name>.marker` exists. Nothing else
//! is persisted: no hashes, no timestamps. The marker is written only after
//! the whole pipeline for that target succeeded.

use std::collections::HashSet;
use std::fmt;
use std::io;

use serde::Serialize;
use tracing::debug;

use crate::config::{Layout, TriggerMode};
use crate::consts::{ALL_TARGET, MARKER_CONTENT};
use crate::recipe::{Recipe, Registry, RegistryError};

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Request {
  All,
  Target(String),
}

impl Request {
  /// Parse a command line target. `clean` is not a build request and is
  /// rejected like any other unknown name.
  pub fn parse(name: &str, registry: &Registry) -> Result<Self, RegistryError> {
    if name == ALL_TARGET {
      return Ok(Request::All);
    }
    registry.resolve(name).map(|recipe| Request::Target(recipe.name.clone()))
  }

  pub fn as_str(&self) -> &str {
    match self {
      Request::All => ALL_TARGET,
      Request::Target(name) => name,
    }
  }
}

impl fmt::Display for Request {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One-hop selection: the recipe itself was requested, one of its
/// dependents was requested, or `all` was requested and the recipe is not
/// excluded from it.
pub fn is_triggered(recipe: &Recipe, request: &Request) -> bool {
  match request {
    Request::All => !recipe.exclude_from_all,
    Request::Target(name) => recipe.name == *name || recipe.dependents.iter().any(|d| d == name),
  }
}

/// Recipes selected by `request`, in registry order.
pub fn select<'r>(registry: &'r Registry, request: &Request, mode: TriggerMode) -> Vec<&'r Recipe> {
  match mode {
    TriggerMode::OneHop => registry.recipes().iter().filter(|r| is_triggered(r, request)).collect(),
    TriggerMode::Transitive => {
      let roots: Vec<&str> = match request {
        Request::All => registry
          .recipes()
          .iter()
          .filter(|r| !r.exclude_from_all)
          .map(|r| r.name.as_str())
          .collect(),
        Request::Target(name) => vec![name.as_str()],
      };
      let closure: HashSet<String> = registry.prerequisite_closure(roots);
      registry.recipes().iter().filter(|r| closure.contains(&r.name)).collect()
    }
  }
}

pub fn is_complete(layout: &Layout, name: &str) -> bool {
  layout.marker_path(name).exists()
}

/// Whether `recipe` must run for `request` under one-hop triggering.
pub fn requires_build(layout: &Layout, recipe: &Recipe, request: &Request) -> bool {
  is_triggered(recipe, request) && !is_complete(layout, &recipe.name)
}

/// Record that `name` finished. Creates `build/<name>/` when needed, which
/// matters for prebuilt targets that never extract anything.
pub fn mark_complete(layout: &Layout, name: &str) -> io::Result<()> {
  let marker = layout.marker_path(name);
  std::fs::create_dir_all(layout.target_dir(name))?;
  std::fs::write(&marker, MARKER_CONTENT)?;
  debug!(target_name = %name, marker = %marker.display(), "marker written");
  Ok(())
}
