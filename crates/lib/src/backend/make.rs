//! Parallel make invocation.

use std::path::Path;

use crate::config::Config;
use crate::process::ToolCommand;

/// `make <target> -j <jobs>` in `dir`. A custom toolchain adds `CC=`/`CXX=`
/// overrides and its library directory to `LD_LIBRARY_PATH`.
pub fn make_command(config: &Config, program: &Path, dir: &Path, target: &str) -> ToolCommand {
  let mut command = ToolCommand::new(program, dir)
    .arg(target)
    .arg("-j")
    .arg(config.jobs.to_string());

  if let Some(lib_dir) = config.toolchain.lib_dir() {
    command = command
      .arg(format!("CC={}", config.toolchain.cc()))
      .arg(format!("CXX={}", config.toolchain.cxx()))
      .append_path("LD_LIBRARY_PATH", lib_dir);
  }

  command
}
