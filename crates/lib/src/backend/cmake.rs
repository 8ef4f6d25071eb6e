//! CMake configure step.

use std::path::Path;

use crate::config::Config;
use crate::process::ToolCommand;

use super::{GeneratorBuild, Strategy};

const LIBSTDCXX_FLAGS: [(&str, &str); 6] = [
  ("CMAKE_C_FLAGS", "-stdlib=libstdc++ -arch x86_64"),
  ("CMAKE_CXX_FLAGS", "-stdlib=libstdc++ -arch x86_64"),
  ("CMAKE_EXE_LINKER_FLAGS", "-stdlib=libstdc++"),
  ("CMAKE_MODULE_LINKER_FLAGS", "-stdlib=libstdc++"),
  ("CMAKE_SHARED_LINKER_FLAGS", "-stdlib=libstdc++"),
  ("CMAKE_STATIC_LINKER_FLAGS", "-stdlib=libstdc++"),
];

/// Recipe flag to command line argument. Names that already start with `-`
/// are passed through as `name=value`.
pub fn flag_arg(name: &str, value: &str) -> String {
  if name.starts_with('-') {
    format!("{name}={value}")
  } else {
    format!("-D{name}={value}")
  }
}

/// Arguments after the program name.
pub fn configure_args(config: &Config, strategy: &Strategy, build: &GeneratorBuild) -> Vec<String> {
  let mut args = Vec::new();

  if let Some(generator) = &strategy.generator {
    args.push("-G".to_string());
    args.push(generator.clone());
  }
  args.push(build.source_dir.to_string_lossy().into_owned());
  args.extend(build.flags.iter().map(|(name, value)| flag_arg(name, value)));

  // Only meaningful for the Visual Studio generators.
  if strategy.generator.is_some() {
    args.push(flag_arg("CMAKE_GENERATOR_PLATFORM", "x64"));
  }

  if config.toolchain.is_custom() {
    args.push(flag_arg("CMAKE_C_COMPILER", &config.toolchain.cc()));
    args.push(flag_arg("CMAKE_CXX_COMPILER", &config.toolchain.cxx()));
  }

  if strategy.libstdcxx_flags {
    args.extend(LIBSTDCXX_FLAGS.iter().map(|(name, value)| flag_arg(name, value)));
  }

  args
}

/// `cmake` run from the build folder.
pub fn configure_command(config: &Config, strategy: &Strategy, program: &Path, build: &GeneratorBuild) -> ToolCommand {
  let mut command = ToolCommand::new(program, &build.build_dir).args(configure_args(config, strategy, build));
  if let Some(lib_dir) = config.toolchain.lib_dir() {
    command = command.append_path("LD_LIBRARY_PATH", lib_dir);
  }
  command
}
