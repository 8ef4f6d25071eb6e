//! Immutable engine configuration.
//!
//! Everything that depends on the host (directory layout, platform identity,
//! toolchain overrides, tool locations) is computed once into a [`Config`]
//! and passed by reference into every component.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::consts::{
  BUILD_DIR, DEFAULT_JOBS, ENV_CMAKE, ENV_MAKE, ENV_MSBUILD, ENV_PATCH, ENV_PREBUILT_ROOT, ENV_ROOT,
  ENV_TOOLCHAIN_ROOT, ENV_VS_PATH, ENV_VS_VERSION, OUTPUT_SUBDIR, PATCHES_DIR, PKGS_DIR, STAGE_DIR,
};
use crate::platform::Os;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("unsupported platform: {0}")]
  UnsupportedPlatform(&'static str),

  #[error("project root not found: {path}")]
  RootNotFound {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("could not determine the current directory: {0}")]
  CurrentDir(#[source] std::io::Error),

  #[error("required tool '{tool}' not found (looked for '{program}')")]
  ToolNotFound { tool: Tool, program: String },

  #[error("invalid value for {var}: {value}")]
  InvalidEnv { var: &'static str, value: String },
}

/// Fixed directory layout below the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layout {
  pub root: PathBuf,
  pub pkgs: PathBuf,
  pub patches: PathBuf,
  pub build: PathBuf,
  pub stage: PathBuf,
}

impl Layout {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    let root = root.into();
    Self {
      pkgs: root.join(PKGS_DIR),
      patches: root.join(PATCHES_DIR),
      build: root.join(BUILD_DIR),
      stage: root.join(STAGE_DIR),
      root,
    }
  }

  /// `build/<name>`: extraction destination and home of the marker.
  pub fn target_dir(&self, name: &str) -> PathBuf {
    self.build.join(name)
  }

  /// `build/<name>/build`: backend output folder.
  pub fn output_dir(&self, name: &str) -> PathBuf {
    self.target_dir(name).join(OUTPUT_SUBDIR)
  }

  /// `build/<name>/.<name>.marker`
  pub fn marker_path(&self, name: &str) -> PathBuf {
    self.target_dir(name).join(format!(".{name}.marker"))
  }

  pub fn package_path(&self, archive: &str) -> PathBuf {
    self.pkgs.join(archive)
  }

  pub fn patch_path(&self, relative: &str) -> PathBuf {
    self.patches.join(relative)
  }

  pub fn stage_include(&self, name: &str) -> PathBuf {
    self.stage.join("include").join(name)
  }

  pub fn stage_lib(&self) -> PathBuf {
    self.stage.join("lib")
  }
}

/// Optional custom compiler root (`GCC_ROOT`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Toolchain {
  pub root: Option<PathBuf>,
}

impl Toolchain {
  pub fn custom(root: impl Into<PathBuf>) -> Self {
    Self {
      root: Some(root.into()),
    }
  }

  pub fn is_custom(&self) -> bool {
    self.root.is_some()
  }

  pub fn cc(&self) -> String {
    match &self.root {
      Some(root) => root.join("bin").join("gcc").to_string_lossy().into_owned(),
      None => "cc".to_string(),
    }
  }

  pub fn cxx(&self) -> String {
    match &self.root {
      Some(root) => root.join("bin").join("g++").to_string_lossy().into_owned(),
      None => "c++".to_string(),
    }
  }

  /// Extra library search directory for tools built against the custom compiler.
  pub fn lib_dir(&self) -> Option<PathBuf> {
    self.root.as_ref().map(|root| root.join("lib64"))
  }
}

/// External tools the engine shells out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
  CMake,
  Make,
  Patch,
  MsBuild,
}

impl std::fmt::Display for Tool {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Tool::CMake => "cmake",
      Tool::Make => "make",
      Tool::Patch => "patch",
      Tool::MsBuild => "msbuild",
    };
    f.write_str(name)
  }
}

/// Program names or paths for each [`Tool`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tools {
  pub cmake: String,
  pub make: String,
  pub patch: String,
  pub msbuild: String,
}

impl Default for Tools {
  fn default() -> Self {
    Self {
      cmake: "cmake".to_string(),
      make: "make".to_string(),
      patch: "patch".to_string(),
      msbuild: r"C:\Windows\Microsoft.NET\Framework64\v4.0.30319\msbuild.exe".to_string(),
    }
  }
}

impl Tools {
  fn from_env() -> Self {
    let defaults = Self::default();
    Self {
      cmake: std::env::var(ENV_CMAKE).unwrap_or(defaults.cmake),
      make: std::env::var(ENV_MAKE).unwrap_or(defaults.make),
      patch: std::env::var(ENV_PATCH).unwrap_or(defaults.patch),
      msbuild: std::env::var(ENV_MSBUILD).unwrap_or(defaults.msbuild),
    }
  }

  pub fn program(&self, tool: Tool) -> &str {
    match tool {
      Tool::CMake => &self.cmake,
      Tool::Make => &self.make,
      Tool::Patch => &self.patch,
      Tool::MsBuild => &self.msbuild,
    }
  }

  /// Resolve a tool to an executable path.
  ///
  /// Bare names are searched on `PATH`; paths must point at an executable.
  pub fn locate(&self, tool: Tool) -> Result<PathBuf, ConfigError> {
    let program = self.program(tool);
    let path = which::which(program).map_err(|_| ConfigError::ToolNotFound {
      tool,
      program: program.to_string(),
    })?;
    debug!(tool = %tool, path = %path.display(), "located tool");
    Ok(path)
  }
}

/// Visual Studio settings used by the MSBuild strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualStudio {
  pub version: String,
  /// `Common7\IDE`, appended to PATH for MSBuild.
  pub ide_path: PathBuf,
  /// `VC\bin`, appended to PATH for script builds.
  pub vc_bin_path: PathBuf,
  pub vc_targets_path: PathBuf,
}

impl VisualStudio {
  pub fn new(version: &str, install_dir: Option<PathBuf>) -> Self {
    let install_dir = install_dir
      .unwrap_or_else(|| PathBuf::from(format!(r"C:\Program Files (x86)\Microsoft Visual Studio {version}.0")));
    Self {
      version: version.to_string(),
      ide_path: install_dir.join("Common7").join("IDE"),
      vc_bin_path: install_dir.join("VC").join("bin"),
      vc_targets_path: PathBuf::from(format!(
        r"C:\Program Files (x86)\MSBuild\Microsoft.Cpp\v4.0\V{version}0"
      )),
    }
  }

  /// Generator name passed to `cmake -G`.
  pub fn generator(&self) -> String {
    format!("Visual Studio {}", self.version)
  }
}

impl Default for VisualStudio {
  fn default() -> Self {
    Self::new("14", None)
  }
}

/// How a requested target pulls in other targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerMode {
  /// A recipe runs only when it is requested or lists the request among its
  /// dependents. No propagation beyond one hop.
  #[default]
  OneHop,
  /// A recipe runs when it is in the transitive prerequisite closure of the
  /// request.
  Transitive,
}

/// Engine configuration, constructed once per invocation.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
  pub layout: Layout,
  pub os: Os,
  pub toolchain: Toolchain,
  pub tools: Tools,
  pub visual_studio: VisualStudio,
  pub prebuilt_root: Option<PathBuf>,
  pub jobs: usize,
  pub trigger: TriggerMode,
}

impl Config {
  /// Configuration with defaults only; nothing is read from the environment.
  pub fn new(root: impl Into<PathBuf>, os: Os) -> Self {
    Self {
      layout: Layout::new(root),
      os,
      toolchain: Toolchain::default(),
      tools: Tools::default(),
      visual_studio: VisualStudio::default(),
      prebuilt_root: None,
      jobs: DEFAULT_JOBS,
      trigger: TriggerMode::default(),
    }
  }

  /// Configuration for the current host.
  ///
  /// The root is `root` when given, else `TPBUILD_ROOT`, else the current
  /// directory. Toolchain, prebuilt tree, tool and Visual Studio overrides
  /// come from the environment.
  pub fn from_env(root: Option<&Path>) -> Result<Self, ConfigError> {
    let os = Os::current().ok_or(ConfigError::UnsupportedPlatform(std::env::consts::OS))?;

    let root = match root {
      Some(root) => root.to_path_buf(),
      None => match std::env::var_os(ENV_ROOT) {
        Some(root) => PathBuf::from(root),
        None => std::env::current_dir().map_err(ConfigError::CurrentDir)?,
      },
    };
    let root = dunce::canonicalize(&root).map_err(|source| ConfigError::RootNotFound { path: root, source })?;

    let mut config = Self::new(root, os);
    config.toolchain = Toolchain {
      root: non_empty_env(ENV_TOOLCHAIN_ROOT).map(PathBuf::from),
    };
    config.prebuilt_root = non_empty_env(ENV_PREBUILT_ROOT).map(PathBuf::from);
    config.tools = Tools::from_env();

    let vs_version = non_empty_env(ENV_VS_VERSION).unwrap_or_else(|| "14".to_string());
    if vs_version.parse::<u32>().is_err() {
      return Err(ConfigError::InvalidEnv {
        var: ENV_VS_VERSION,
        value: vs_version,
      });
    }
    config.visual_studio = VisualStudio::new(&vs_version, non_empty_env(ENV_VS_PATH).map(PathBuf::from));

    debug!(
      root = %config.layout.root.display(),
      os = %config.os,
      custom_toolchain = config.toolchain.is_custom(),
      "configuration loaded"
    );

    Ok(config)
  }

  pub fn with_jobs(mut self, jobs: usize) -> Self {
    self.jobs = jobs.max(1);
    self
  }

  pub fn with_trigger(mut self, trigger: TriggerMode) -> Self {
    self.trigger = trigger;
    self
  }

  pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
    self.toolchain = toolchain;
    self
  }

  pub fn with_tools(mut self, tools: Tools) -> Self {
    self.tools = tools;
    self
  }

  pub fn with_prebuilt_root(mut self, path: impl Into<PathBuf>) -> Self {
    self.prebuilt_root = Some(path.into());
    self
  }
}

fn non_empty_env(var: &str) -> Option<String> {
  std::env::var(var).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  #[test]
  fn layout_paths() {
    let layout = Layout::new("/work");

    assert_eq!(layout.target_dir("tbb"), PathBuf::from("/work/build/tbb"));
    assert_eq!(layout.output_dir("tbb"), PathBuf::from("/work/build/tbb/build"));
    assert_eq!(layout.marker_path("tbb"), PathBuf::from("/work/build/tbb/.tbb.marker"));
    assert_eq!(layout.package_path("zlib-1.2.11.zip"), PathBuf::from("/work/pkgs/zlib-1.2.11.zip"));
    assert_eq!(
      layout.patch_path("tbb/tbb_config.h.patch"),
      PathBuf::from("/work/patches/tbb/tbb_config.h.patch")
    );
    assert_eq!(layout.stage_include("ptex"), PathBuf::from("/work/stage/include/ptex"));
    assert_eq!(layout.stage_lib(), PathBuf::from("/work/stage/lib"));
  }

  #[test]
  fn default_toolchain_uses_system_compilers() {
    let toolchain = Toolchain::default();

    assert!(!toolchain.is_custom());
    assert_eq!(toolchain.cc(), "cc");
    assert_eq!(toolchain.cxx(), "c++");
    assert_eq!(toolchain.lib_dir(), None);
  }

  #[test]
  fn custom_toolchain_paths() {
    let toolchain = Toolchain::custom("/opt/gcc");

    assert_eq!(toolchain.cc(), PathBuf::from("/opt/gcc/bin/gcc").to_string_lossy());
    assert_eq!(toolchain.cxx(), PathBuf::from("/opt/gcc/bin/g++").to_string_lossy());
    assert_eq!(toolchain.lib_dir(), Some(PathBuf::from("/opt/gcc/lib64")));
  }

  #[test]
  fn visual_studio_defaults() {
    let vs = VisualStudio::default();

    assert_eq!(vs.generator(), "Visual Studio 14");
    assert!(vs.vc_targets_path.to_string_lossy().ends_with("V140"));
  }

  #[test]
  fn locate_missing_tool_is_config_error() {
    let tools = Tools {
      cmake: "tpbuild-definitely-missing-cmake".to_string(),
      ..Tools::default()
    };

    let err = tools.locate(Tool::CMake).unwrap_err();

    assert!(matches!(err, ConfigError::ToolNotFound { tool: Tool::CMake, .. }));
  }

  #[test]
  fn with_jobs_clamps_to_one() {
    let config = Config::new("/work", Os::Linux).with_jobs(0);
    assert_eq!(config.jobs, 1);
  }

  #[test]
  #[serial]
  fn from_env_reads_overrides() {
    let temp = TempDir::new().unwrap();
    temp_env::with_vars(
      [
        (ENV_ROOT, Some(temp.path().to_str().unwrap())),
        (ENV_TOOLCHAIN_ROOT, Some("/opt/gcc")),
        (ENV_PREBUILT_ROOT, Some("/opt/fabric")),
        (ENV_CMAKE, Some("/usr/local/bin/cmake")),
        (ENV_VS_VERSION, None),
      ],
      || {
        let config = Config::from_env(None).unwrap();

        assert_eq!(config.layout.root, dunce::canonicalize(temp.path()).unwrap());
        assert_eq!(config.toolchain.root, Some(PathBuf::from("/opt/gcc")));
        assert_eq!(config.prebuilt_root, Some(PathBuf::from("/opt/fabric")));
        assert_eq!(config.tools.cmake, "/usr/local/bin/cmake");
        assert_eq!(config.visual_studio.version, "14");
        assert_eq!(config.trigger, TriggerMode::OneHop);
      },
    );
  }

  #[test]
  #[serial]
  fn explicit_root_wins_over_env() {
    let from_env = TempDir::new().unwrap();
    let explicit = TempDir::new().unwrap();
    temp_env::with_var(ENV_ROOT, Some(from_env.path().to_str().unwrap()), || {
      let config = Config::from_env(Some(explicit.path())).unwrap();
      assert_eq!(config.layout.root, dunce::canonicalize(explicit.path()).unwrap());
    });
  }

  #[test]
  #[serial]
  fn empty_toolchain_env_is_ignored() {
    let temp = TempDir::new().unwrap();
    temp_env::with_var(ENV_TOOLCHAIN_ROOT, Some(""), || {
      let config = Config::from_env(Some(temp.path())).unwrap();
      assert!(!config.toolchain.is_custom());
    });
  }

  #[test]
  #[serial]
  fn missing_root_is_reported() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nope");

    let err = Config::from_env(Some(&missing)).unwrap_err();

    assert!(matches!(err, ConfigError::RootNotFound { .. }));
  }

  #[test]
  #[serial]
  fn invalid_vs_version_rejected() {
    let temp = TempDir::new().unwrap();
    temp_env::with_var(ENV_VS_VERSION, Some("fourteen"), || {
      let err = Config::from_env(Some(temp.path())).unwrap_err();
      assert!(matches!(err, ConfigError::InvalidEnv { var: ENV_VS_VERSION, .. }));
    });
  }
}
