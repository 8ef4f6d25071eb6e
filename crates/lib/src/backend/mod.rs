//! Build backend adapter.
//!
//! A [`BuildInvocation`] is built fresh for every target from its recipe
//! backend with all placeholders resolved. [`build`] turns it into a list of
//! tool commands using the platform [`Strategy`] and runs them in order,
//! stopping at the first failure.

pub mod cmake;
pub mod make;
pub mod msbuild;
pub mod script;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{Config, ConfigError, Tool};
use crate::platform::Os;
use crate::process::{ProcessError, ToolCommand};
use crate::recipe::Configuration;
use crate::template::TemplateError;

#[derive(Debug, Error)]
pub enum BackendError {
  #[error(transparent)]
  Tool(#[from] ConfigError),

  #[error("failed to create build folder {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read script template {path}: {source}")]
  ReadTemplate {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("script template {path}: {source}")]
  Template {
    path: PathBuf,
    #[source]
    source: TemplateError,
  },

  #[error("failed to write build script {path}: {source}")]
  WriteScript {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("{step} failed: {source}")]
  Step {
    step: String,
    #[source]
    source: ProcessError,
  },
}

/// Generator + native build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratorBuild {
  pub source_dir: PathBuf,
  pub build_dir: PathBuf,
  pub flags: BTreeMap<String, String>,
  pub projects: Vec<String>,
  pub configuration: Configuration,
}

/// A build tool run directly with one top-level target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectBuild {
  pub dir: PathBuf,
  pub target: String,
}

/// A generated script run from the source tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptInvocation {
  pub template: PathBuf,
  pub script: PathBuf,
  pub source_dir: PathBuf,
  pub build_dir: PathBuf,
  pub tokens: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildInvocation {
  Generator(GeneratorBuild),
  Direct(DirectBuild),
  Script(ScriptInvocation),
}

impl BuildInvocation {
  /// The folder the backend owns and creates when missing.
  pub fn build_dir(&self) -> &Path {
    match self {
      BuildInvocation::Generator(build) => &build.build_dir,
      BuildInvocation::Direct(build) => &build.dir,
      BuildInvocation::Script(script) => &script.build_dir,
    }
  }
}

/// Native build driver run after the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeDriver {
  Make,
  MsBuild,
}

/// Per-platform backend choices, fixed before anything runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Strategy {
  /// `cmake -G` value; `None` keeps cmake's default.
  pub generator: Option<String>,
  pub driver: NativeDriver,
  /// Force libstdc++ and x86_64 through the CMake flag set (darwin).
  pub libstdcxx_flags: bool,
}

impl Strategy {
  pub fn for_config(config: &Config) -> Self {
    match config.os {
      Os::Windows => Self {
        generator: Some(config.visual_studio.generator()),
        driver: NativeDriver::MsBuild,
        libstdcxx_flags: false,
      },
      Os::MacOs => Self {
        generator: None,
        driver: NativeDriver::Make,
        libstdcxx_flags: true,
      },
      Os::Linux => Self {
        generator: None,
        driver: NativeDriver::Make,
        libstdcxx_flags: false,
      },
    }
  }
}

/// One labelled tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
  pub label: String,
  pub command: ToolCommand,
}

/// How tool names become programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
  /// Search `PATH`; a missing tool is an error.
  Locate,
  /// Use the configured name as-is (dry runs).
  Verbatim,
}

fn program(config: &Config, tool: Tool, lookup: Lookup) -> Result<PathBuf, BackendError> {
  match lookup {
    Lookup::Locate => Ok(config.tools.locate(tool)?),
    Lookup::Verbatim => Ok(PathBuf::from(config.tools.program(tool))),
  }
}

/// The commands `invocation` runs, in order.
pub fn steps(config: &Config, invocation: &BuildInvocation, lookup: Lookup) -> Result<Vec<BuildStep>, BackendError> {
  let strategy = Strategy::for_config(config);

  match invocation {
    BuildInvocation::Generator(build) => {
      let mut steps = vec![BuildStep {
        label: "configure".to_string(),
        command: cmake::configure_command(config, &strategy, &program(config, Tool::CMake, lookup)?, build),
      }];
      let (tool, native): (Tool, fn(&Config, &Path, &GeneratorBuild, &str) -> ToolCommand) = match strategy.driver {
        NativeDriver::Make => (Tool::Make, |config, program, build, project| {
          make::make_command(config, program, &build.build_dir, project)
        }),
        NativeDriver::MsBuild => (Tool::MsBuild, msbuild::msbuild_command),
      };
      if !build.projects.is_empty() {
        let native_program = program(config, tool, lookup)?;
        for project in &build.projects {
          steps.push(BuildStep {
            label: format!("build {project}"),
            command: native(config, &native_program, build, project),
          });
        }
      }
      Ok(steps)
    }
    BuildInvocation::Direct(build) => Ok(vec![BuildStep {
      label: format!("build {}", build.target),
      command: make::make_command(config, &program(config, Tool::Make, lookup)?, &build.dir, &build.target),
    }]),
    BuildInvocation::Script(script) => Ok(vec![BuildStep {
      label: format!("script {}", script.script.display()),
      command: script::script_command(config, script),
    }]),
  }
}

/// Run one build invocation to completion.
pub async fn build(config: &Config, invocation: &BuildInvocation) -> Result<(), BackendError> {
  let build_dir = invocation.build_dir();
  std::fs::create_dir_all(build_dir).map_err(|source| BackendError::CreateDir {
    path: build_dir.to_path_buf(),
    source,
  })?;

  if let BuildInvocation::Script(invocation) = invocation {
    script::write_script(invocation)?;
  }

  let steps = steps(config, invocation, Lookup::Locate)?;
  debug!(steps = steps.len(), "backend steps resolved");

  for step in steps {
    info!(step = %step.label, "running");
    step.command.run().await.map_err(|source| BackendError::Step {
      step: step.label.clone(),
      source,
    })?;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Toolchain;

  fn generator(projects: &[&str]) -> BuildInvocation {
    BuildInvocation::Generator(GeneratorBuild {
      source_dir: PathBuf::from("/w/build/tbb/tbb-tbb43u6"),
      build_dir: PathBuf::from("/w/build/tbb/build"),
      flags: BTreeMap::new(),
      projects: projects.iter().map(|p| p.to_string()).collect(),
      configuration: Configuration::Release,
    })
  }

  fn labels(steps: &[BuildStep]) -> Vec<&str> {
    steps.iter().map(|s| s.label.as_str()).collect()
  }

  #[test]
  fn strategy_per_platform() {
    let linux = Strategy::for_config(&Config::new("/w", Os::Linux));
    assert_eq!(linux.generator, None);
    assert_eq!(linux.driver, NativeDriver::Make);
    assert!(!linux.libstdcxx_flags);

    let darwin = Strategy::for_config(&Config::new("/w", Os::MacOs));
    assert!(darwin.libstdcxx_flags);

    let windows = Strategy::for_config(&Config::new("/w", Os::Windows));
    assert_eq!(windows.generator.as_deref(), Some("Visual Studio 14"));
    assert_eq!(windows.driver, NativeDriver::MsBuild);
  }

  #[test]
  fn generator_configures_then_builds_each_project() {
    let config = Config::new("/w", Os::Linux);

    let steps = steps(&config, &generator(&["tbbmalloc", "tbb"]), Lookup::Verbatim).unwrap();

    assert_eq!(labels(&steps), vec!["configure", "build tbbmalloc", "build tbb"]);
    assert_eq!(steps[1].command.command_line(), "make tbbmalloc -j 4");
    assert_eq!(steps[1].command.cwd(), Path::new("/w/build/tbb/build"));
  }

  #[test]
  fn windows_uses_msbuild_projects() {
    let config = Config::new("/w", Os::Windows);

    let steps = steps(&config, &generator(&["install"]), Lookup::Verbatim).unwrap();

    assert_eq!(labels(&steps), vec!["configure", "build install"]);
    assert!(steps[1].command.get_args()[0].ends_with("INSTALL.vcxproj"));
  }

  #[test]
  fn direct_build_is_a_single_make() {
    let config = Config::new("/w", Os::Linux)
      .with_jobs(8)
      .with_toolchain(Toolchain::custom("/opt/gcc"));
    let invocation = BuildInvocation::Direct(DirectBuild {
      dir: PathBuf::from("/w/build/x/x-1.0"),
      target: "install".to_string(),
    });

    let steps = steps(&config, &invocation, Lookup::Verbatim).unwrap();

    assert_eq!(steps.len(), 1);
    assert_eq!(
      steps[0].command.command_line(),
      format!(
        "make install -j 8 CC={} CXX={}",
        Toolchain::custom("/opt/gcc").cc(),
        Toolchain::custom("/opt/gcc").cxx()
      )
    );
  }

  #[test]
  fn missing_tool_is_reported_when_locating() {
    let mut config = Config::new("/w", Os::Linux);
    config.tools.cmake = "tpbuild-no-such-cmake".to_string();

    let err = steps(&config, &generator(&["all"]), Lookup::Locate).unwrap_err();

    assert!(matches!(err, BackendError::Tool(ConfigError::ToolNotFound { tool: Tool::CMake, .. })));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn first_failing_project_stops_the_build() {
    use crate::util::testutil::{TestProject, write_script};

    let project = TestProject::new();
    let failing_make = project.root.join("tools").join("make");
    let log = project.log.display().to_string();
    write_script(&failing_make, &format!("echo \"make $*\" >> \"{log}\"\nexit 2"));
    let config = project.config();
    let invocation = BuildInvocation::Generator(GeneratorBuild {
      source_dir: project.root.join("src"),
      build_dir: project.root.join("build/x/build"),
      flags: BTreeMap::new(),
      projects: vec!["first".to_string(), "second".to_string()],
      configuration: Configuration::Release,
    });

    let err = build(&config, &invocation).await.unwrap_err();

    assert!(matches!(err, BackendError::Step { ref step, .. } if step == "build first"));
    assert!(project.root.join("build/x/build").is_dir());
    let lines = project.log_lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("cmake "));
    assert!(lines[1].starts_with("make first"));
  }
}
