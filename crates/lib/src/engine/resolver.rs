//! Placeholder resolution for one target.
//!
//! A [`TargetResolver`] knows the configuration, the registry (for
//! `$${target:NAME}`), the target being processed and, once acquisition has
//! happened, its source directory. It turns recipe data into the resolved
//! forms the acquisition, backend and staging components consume.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::acquire::{Package, ResolvedSource};
use crate::backend::{BuildInvocation, DirectBuild, GeneratorBuild, ScriptInvocation};
use crate::config::Config;
use crate::consts::ENV_PREBUILT_ROOT;
use crate::placeholder::{PlaceholderError, Resolver, Var, substitute};
use crate::recipe::{Backend, Registry, Source, StagingRule};
use crate::stage::ResolvedStaging;

pub struct TargetResolver<'a> {
  config: &'a Config,
  registry: &'a Registry,
  target: &'a str,
  src: Option<PathBuf>,
}

impl<'a> TargetResolver<'a> {
  pub fn new(config: &'a Config, registry: &'a Registry, target: &'a str) -> Self {
    Self {
      config,
      registry,
      target,
      src: None,
    }
  }

  /// Record the acquired source directory; enables `$${src}`.
  pub fn set_src(&mut self, src: PathBuf) {
    self.src = Some(src);
  }

  fn src(&self) -> Result<PathBuf, PlaceholderError> {
    self.src.clone().ok_or_else(src_unknown)
  }

  fn path(&self, input: &str) -> Result<PathBuf, PlaceholderError> {
    substitute(input, self).map(PathBuf::from)
  }

  fn substitute_values(&self, values: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>, PlaceholderError> {
    values
      .iter()
      .map(|(name, value)| Ok((name.clone(), substitute(value, self)?)))
      .collect()
  }

  pub fn resolve_source(&self, source: &Source) -> Result<ResolvedSource, PlaceholderError> {
    let layout = &self.config.layout;
    Ok(match source {
      Source::Archive { archive, folder } => ResolvedSource::Archive(Package {
        archive: layout.package_path(archive),
        dest: layout.target_dir(self.target),
        folder: folder.clone(),
      }),
      Source::Checkout { path } => ResolvedSource::Checkout(self.path(path)?),
      Source::Prebuilt { path } => ResolvedSource::Prebuilt(self.path(path)?),
    })
  }

  /// `None` for recipes that build nothing.
  pub fn resolve_backend(&self, backend: &Backend) -> Result<Option<BuildInvocation>, PlaceholderError> {
    let layout = &self.config.layout;
    let invocation = match backend {
      Backend::CMake(build) => BuildInvocation::Generator(GeneratorBuild {
        source_dir: match &build.source {
          Some(source) => self.path(source)?,
          None => self.src()?,
        },
        build_dir: layout.output_dir(self.target),
        flags: self.substitute_values(&build.flags)?,
        projects: build.projects.clone(),
        configuration: build.configuration,
      }),
      Backend::Make(build) => BuildInvocation::Direct(DirectBuild {
        dir: self.path(&build.dir)?,
        target: build.target.clone(),
      }),
      Backend::Script(build) => {
        let source_dir = self.src()?;
        BuildInvocation::Script(ScriptInvocation {
          template: layout.patch_path(&build.template),
          script: source_dir.join(&build.script_name),
          source_dir,
          build_dir: layout.output_dir(self.target),
          tokens: self.substitute_values(&build.tokens)?,
        })
      }
      Backend::None => return Ok(None),
    };
    Ok(Some(invocation))
  }

  pub fn resolve_staging(&self, rule: &StagingRule) -> Result<ResolvedStaging, PlaceholderError> {
    let paths = |dirs: &[String]| dirs.iter().map(|d| self.path(d)).collect::<Result<Vec<_>, _>>();
    Ok(ResolvedStaging {
      include_dirs: paths(&rule.include_dirs)?,
      library_dirs: paths(&rule.library_dirs)?,
    })
  }
}

fn src_unknown() -> PlaceholderError {
  PlaceholderError::Unresolved {
    var: Var::Src.to_string(),
    reason: "source directory is not known before acquisition".to_string(),
  }
}

impl Resolver for TargetResolver<'_> {
  fn resolve_var(&self, var: Var) -> Result<Cow<'_, str>, PlaceholderError> {
    let layout = &self.config.layout;
    Ok(match var {
      Var::Root => layout.root.to_string_lossy(),
      Var::Stage => layout.stage.to_string_lossy(),
      Var::Build => layout.build.to_string_lossy(),
      Var::Src => match &self.src {
        Some(src) => src.to_string_lossy(),
        None => return Err(src_unknown()),
      },
      Var::Out => Cow::Owned(layout.output_dir(self.target).to_string_lossy().into_owned()),
      Var::Prebuilt => match &self.config.prebuilt_root {
        Some(root) => root.to_string_lossy(),
        None => {
          return Err(PlaceholderError::Unresolved {
            var: var.to_string(),
            reason: format!("{ENV_PREBUILT_ROOT} is not set"),
          });
        }
      },
      Var::Cc => Cow::Owned(self.config.toolchain.cc()),
      Var::Cxx => Cow::Owned(self.config.toolchain.cxx()),
      Var::VsVersion => Cow::Borrowed(self.config.visual_studio.version.as_str()),
    })
  }

  fn resolve_target(&self, name: &str) -> Result<Cow<'_, str>, PlaceholderError> {
    if !self.registry.contains(name) {
      return Err(PlaceholderError::UnknownTarget(name.to_string()));
    }
    Ok(Cow::Owned(
      self.config.layout.target_dir(name).to_string_lossy().into_owned(),
    ))
  }
}
