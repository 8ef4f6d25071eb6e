//! MSBuild invocation for Visual Studio generated projects.

use std::path::Path;

use crate::config::Config;
use crate::process::ToolCommand;

use super::GeneratorBuild;

/// Logical project name to the project file CMake generates for it.
///
/// `install` and `all` are spelled `INSTALL` and `ALL_BUILD` by the Visual
/// Studio generators; every other name maps to `<name>.vcxproj` unchanged.
pub fn project_file(project: &str) -> String {
  let concrete = match project {
    "install" => "INSTALL",
    "all" => "ALL_BUILD",
    other => other,
  };
  format!("{concrete}.vcxproj")
}

/// `msbuild <project>.vcxproj /t:build /p:Configuration=<cfg> /p:Platform=x64`
pub fn msbuild_command(config: &Config, program: &Path, build: &GeneratorBuild, project: &str) -> ToolCommand {
  let vs = &config.visual_studio;
  ToolCommand::new(program, &build.build_dir)
    .arg(project_file(project))
    .arg("/t:build")
    .arg(format!("/p:Configuration={}", build.configuration.as_str()))
    .arg("/p:Platform=x64")
    .append_path("PATH", &vs.ide_path)
    .env("VCTargetsPath", vs.vc_targets_path.as_os_str())
}
