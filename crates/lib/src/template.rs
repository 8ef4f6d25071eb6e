//! Literal `{{TOKEN}}` substitution for build-driver script templates.
//!
//! Script templates under `patches/` are shell or batch files with tokens
//! such as `{{SOURCEPATH}}`. Substitution is plain string replacement so the
//! generated script matches the template byte for byte outside the tokens.
//! Before anything is written, every token that appears in the template must
//! have a value.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("template tokens without a value: {}", .0.iter().cloned().collect::<Vec<_>>().join(", "))]
  MissingTokens(BTreeSet<String>),

  #[error("invalid token name '{0}': only A-Z, 0-9 and _ are allowed")]
  InvalidTokenName(String),
}

/// Token names (without braces) found in `template`.
///
/// Only `{{NAME}}` where `NAME` is made of `A-Z`, `0-9` or `_` counts as a
/// token; other brace pairs are left alone.
pub fn tokens(template: &str) -> BTreeSet<String> {
  let mut found = BTreeSet::new();
  let mut rest = template;

  while let Some(start) = rest.find("{{") {
    let after = &rest[start + 2..];
    match after.find("}}") {
      Some(end) => {
        let name = &after[..end];
        if is_token_name(name) {
          found.insert(name.to_string());
          rest = &after[end + 2..];
        } else {
          rest = &rest[start + 1..];
        }
      }
      None => break,
    }
  }

  found
}

fn is_token_name(name: &str) -> bool {
  !name.is_empty() && name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Replace every `{{NAME}}` in `template` with `values[NAME]`.
///
/// # Errors
///
/// `MissingTokens` if the template contains tokens with no value;
/// `InvalidTokenName` if a value key could never match a token.
pub fn render(template: &str, values: &BTreeMap<String, String>) -> Result<String, TemplateError> {
  if let Some(bad) = values.keys().find(|k| !is_token_name(k)) {
    return Err(TemplateError::InvalidTokenName(bad.clone()));
  }

  let required = tokens(template);
  let missing: BTreeSet<String> = required.iter().filter(|t| !values.contains_key(*t)).cloned().collect();
  if !missing.is_empty() {
    return Err(TemplateError::MissingTokens(missing));
  }

  let mut content = template.to_string();
  for (name, value) in values {
    if required.contains(name) {
      content = content.replace(&format!("{{{{{name}}}}}"), value);
    } else {
      debug!(token = %name, "template value not used by template");
    }
  }

  Ok(content)
}
