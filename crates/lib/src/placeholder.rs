//! Placeholder parsing and substitution for recipe strings.
//!
//! Recipes are static data, but many of their values (CMake flags, staging
//! directories, script tokens) point into the project layout, which is only
//! known once a [`Config`](crate::config::Config) exists. Recipe strings
//! therefore carry placeholders that are resolved right before a target runs.
//!
//! # Placeholder Formats
//!
//! - `$${root}` - the project root
//! - `$${stage}` - the stage directory
//! - `$${build}` - the build tree root
//! - `$${src}` - the current target's resolved source directory
//! - `$${out}` - the current target's backend output folder
//! - `$${target:<name>}` - another target's working folder (`build/<name>`)
//! - `$${prebuilt}` - the external prebuilt third-party tree
//! - `$${cc}` / `$${cxx}` - the configured C / C++ compiler
//! - `$${vsversion}` - the Visual Studio version used by MSBuild
//!
//! # Shell Variables
//!
//! Single `$` characters pass through unchanged, so `$PATH` in a flag value
//! survives substitution untouched.
//!
//! # Escaping
//!
//! Use `$$$` before `{` to produce a literal `$${` sequence.
//!
//! # Example
//!
//! ```
//! use tpbuild_lib::placeholder::{parse, Placeholder, Segment, Var};
//!
//! let segments = parse("$${stage}/include/zlib").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Placeholder(Placeholder::Var(Var::Stage)),
//!     Segment::Literal("/include/zlib".to_string()),
//! ]);
//! ```

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

/// A single-word placeholder variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Var {
  Root,
  Stage,
  Build,
  Src,
  Out,
  Prebuilt,
  Cc,
  Cxx,
  VsVersion,
}

impl Var {
  pub const ALL: [Var; 9] = [
    Var::Root,
    Var::Stage,
    Var::Build,
    Var::Src,
    Var::Out,
    Var::Prebuilt,
    Var::Cc,
    Var::Cxx,
    Var::VsVersion,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Var::Root => "root",
      Var::Stage => "stage",
      Var::Build => "build",
      Var::Src => "src",
      Var::Out => "out",
      Var::Prebuilt => "prebuilt",
      Var::Cc => "cc",
      Var::Cxx => "cxx",
      Var::VsVersion => "vsversion",
    }
  }

  fn from_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|v| v.as_str() == name)
  }
}

impl fmt::Display for Var {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A parsed placeholder reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
  /// `$${root}`, `$${stage}`, ...
  Var(Var),

  /// `$${target:<name>}` - working folder of another target
  Target(String),
}

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders)
  Literal(String),

  /// A placeholder to be resolved
  Placeholder(Placeholder),
}

/// Errors that can occur during placeholder parsing or resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("unknown placeholder: {0}")]
  UnknownType(String),

  #[error("malformed placeholder: {0}")]
  Malformed(String),

  #[error("placeholder '{var}' has no value: {reason}")]
  Unresolved { var: String, reason: String },

  #[error("placeholder references unknown target '{0}'")]
  UnknownTarget(String),
}

/// Trait for resolving placeholder values during execution.
pub trait Resolver {
  /// Resolve a single-word variable.
  fn resolve_var(&self, var: Var) -> Result<Cow<'_, str>, PlaceholderError>;

  /// Resolve the working folder of a named target.
  fn resolve_target(&self, name: &str) -> Result<Cow<'_, str>, PlaceholderError>;
}

/// Parse a string containing placeholders into segments.
///
/// # Errors
///
/// Returns an error if a placeholder is malformed (unclosed, unknown type, etc.)
pub fn parse(input: &str) -> Result<Vec<Segment>, PlaceholderError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '$' {
      literal.push(ch);
      continue;
    }

    match chars.peek() {
      Some((_, '$')) => {
        chars.next();

        match chars.peek() {
          Some((_, '$')) => {
            chars.next();

            match chars.peek() {
              Some((_, '{')) => {
                // Escaped: $$${ -> $${ (literal)
                literal.push_str("$${");
                chars.next();
              }
              _ => literal.push_str("$$$"),
            }
          }
          Some((_, '{')) => {
            chars.next();

            if !literal.is_empty() {
              segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }

            let mut content = String::new();
            let mut found_close = false;

            for (_, c) in chars.by_ref() {
              if c == '}' {
                found_close = true;
                break;
              }
              content.push(c);
            }

            if !found_close {
              return Err(PlaceholderError::Unclosed(pos));
            }

            segments.push(Segment::Placeholder(parse_placeholder_content(&content)?));
          }
          _ => literal.push_str("$$"),
        }
      }
      // A lone $ is a shell variable, keep it
      _ => literal.push('$'),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Parse the content inside a placeholder (everything between `$${` and `}`).
fn parse_placeholder_content(content: &str) -> Result<Placeholder, PlaceholderError> {
  match content.split_once(':') {
    None => Var::from_name(content)
      .map(Placeholder::Var)
      .ok_or_else(|| PlaceholderError::UnknownType(content.to_string())),
    Some(("target", name)) => {
      if name.is_empty() {
        return Err(PlaceholderError::Malformed(format!("target placeholder missing name: '{content}'")));
      }
      Ok(Placeholder::Target(name.to_string()))
    }
    Some((kind, _)) => Err(PlaceholderError::UnknownType(kind.to_string())),
  }
}

/// Substitute all placeholders in a string using the provided resolver.
///
/// # Errors
///
/// Returns an error if parsing fails or if any placeholder cannot be resolved.
pub fn substitute(input: &str, resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let segments = parse(input)?;
  let mut result = String::with_capacity(input.len());

  for segment in &segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Placeholder(Placeholder::Var(var)) => result.push_str(&resolver.resolve_var(*var)?),
      Segment::Placeholder(Placeholder::Target(name)) => result.push_str(&resolver.resolve_target(name)?),
    }
  }

  Ok(result)
}

/// Names of every target referenced through `$${target:<name>}` in `input`.
///
/// Used by registry validation; parse errors yield an empty list and are
/// reported later, when the string is actually substituted.
pub fn referenced_targets(input: &str) -> Vec<String> {
  parse(input)
    .map(|segments| {
      segments
        .into_iter()
        .filter_map(|s| match s {
          Segment::Placeholder(Placeholder::Target(name)) => Some(name),
          _ => None,
        })
        .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  struct TestResolver {
    vars: HashMap<Var, String>,
    targets: HashMap<String, String>,
  }

  impl TestResolver {
    fn new() -> Self {
      Self {
        vars: HashMap::new(),
        targets: HashMap::new(),
      }
    }

    fn with_var(mut self, var: Var, value: &str) -> Self {
      self.vars.insert(var, value.to_string());
      self
    }

    fn with_target(mut self, name: &str, value: &str) -> Self {
      self.targets.insert(name.to_string(), value.to_string());
      self
    }
  }

  impl Resolver for TestResolver {
    fn resolve_var(&self, var: Var) -> Result<Cow<'_, str>, PlaceholderError> {
      self
        .vars
        .get(&var)
        .map(|s| Cow::Borrowed(s.as_str()))
        .ok_or_else(|| PlaceholderError::Unresolved {
          var: var.to_string(),
          reason: "not set in test".to_string(),
        })
    }

    fn resolve_target(&self, name: &str) -> Result<Cow<'_, str>, PlaceholderError> {
      self
        .targets
        .get(name)
        .map(|s| Cow::Borrowed(s.as_str()))
        .ok_or_else(|| PlaceholderError::UnknownTarget(name.to_string()))
    }
  }

  #[test]
  fn cmake_flag_into_stage() {
    let resolver = TestResolver::new().with_var(Var::Stage, "/work/stage");

    let result = substitute("$${stage}/lib/zlibstatic.lib", &resolver).unwrap();

    assert_eq!(result, "/work/stage/lib/zlibstatic.lib");
  }

  #[test]
  fn cross_target_reference() {
    let resolver = TestResolver::new().with_target("ptex", "/work/build/ptex");

    let result = substitute("$${target:ptex}/build/ptex/Release/Ptex.lib", &resolver).unwrap();

    assert_eq!(result, "/work/build/ptex/build/ptex/Release/Ptex.lib");
  }

  #[test]
  fn shell_variables_pass_through() {
    let resolver = TestResolver::new().with_var(Var::Cxx, "/opt/gcc/bin/g++");

    let result = substitute("using gcc : 4.8 : $${cxx} ; # $HOME $$PATH", &resolver).unwrap();

    assert_eq!(result, "using gcc : 4.8 : /opt/gcc/bin/g++ ; # $HOME $$PATH");
  }

  #[test]
  fn escaped_placeholder_is_literal() {
    let resolver = TestResolver::new();

    let result = substitute("$$${stage}", &resolver).unwrap();

    assert_eq!(result, "$${stage}");
  }

  #[test]
  fn unclosed_placeholder_reports_position() {
    assert_eq!(parse("abc $${stage"), Err(PlaceholderError::Unclosed(4)));
  }

  #[test]
  fn unknown_variable_rejected() {
    assert_eq!(
      parse("$${home}"),
      Err(PlaceholderError::UnknownType("home".to_string()))
    );
    assert_eq!(
      parse("$${build:zlib:out}"),
      Err(PlaceholderError::UnknownType("build".to_string()))
    );
  }

  #[test]
  fn empty_target_name_is_malformed() {
    assert!(matches!(parse("$${target:}"), Err(PlaceholderError::Malformed(_))));
  }

  #[test]
  fn unresolved_variable_propagates() {
    let resolver = TestResolver::new();

    let err = substitute("$${prebuilt}/ThirdParty", &resolver).unwrap_err();

    assert!(matches!(err, PlaceholderError::Unresolved { ref var, .. } if var == "prebuilt"));
  }

  #[test]
  fn referenced_targets_collects_names() {
    let names = referenced_targets("$${target:ptex}/a;$${stage}/b;$${target:tbb}");
    assert_eq!(names, vec!["ptex".to_string(), "tbb".to_string()]);
  }

  #[test]
  fn every_var_round_trips_its_name() {
    for var in Var::ALL {
      let parsed = parse(&format!("$${{{}}}", var.as_str())).unwrap();
      assert_eq!(parsed, vec![Segment::Placeholder(Placeholder::Var(var))]);
    }
  }
}
