//! Templated build-driver scripts.
//!
//! Some libraries (boost) build with their own driver rather than through a
//! generator. Their scripts live as templates under `patches/`, get their
//! `{{TOKEN}}`s replaced, are written into the source tree and run from there.

use tracing::debug;

use crate::config::Config;
use crate::consts::ENV_TOOLCHAIN_ROOT;
use crate::platform::Os;
use crate::process::ToolCommand;
use crate::template;

use super::{BackendError, ScriptInvocation};

/// Read and fill the template. Nothing is written when a token is missing.
pub fn render_script(invocation: &ScriptInvocation) -> Result<String, BackendError> {
  let content = std::fs::read_to_string(&invocation.template).map_err(|source| BackendError::ReadTemplate {
    path: invocation.template.clone(),
    source,
  })?;
  template::render(&content, &invocation.tokens).map_err(|source| BackendError::Template {
    path: invocation.template.clone(),
    source,
  })
}

/// Render the script to its destination and make it executable.
pub fn write_script(invocation: &ScriptInvocation) -> Result<(), BackendError> {
  let content = render_script(invocation)?;
  let write_err = |source| BackendError::WriteScript {
    path: invocation.script.clone(),
    source,
  };

  std::fs::write(&invocation.script, content).map_err(write_err)?;

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = std::fs::metadata(&invocation.script).map_err(write_err)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    std::fs::set_permissions(&invocation.script, permissions).map_err(write_err)?;
  }

  debug!(script = %invocation.script.display(), "build script written");
  Ok(())
}

/// Run the written script from the source tree.
///
/// With a custom toolchain, `GCC_ROOT` is hidden from the script (b2 reads
/// it and picks the wrong compiler) and the toolchain libraries are added to
/// `LD_LIBRARY_PATH`. On windows the Visual C++ binaries are put on `PATH`.
pub fn script_command(config: &Config, invocation: &ScriptInvocation) -> ToolCommand {
  let mut command = ToolCommand::new(&invocation.script, &invocation.source_dir);

  if config.os == Os::Windows {
    command = command.append_path("PATH", &config.visual_studio.vc_bin_path);
  }
  if let Some(lib_dir) = config.toolchain.lib_dir() {
    command = command.env_remove(ENV_TOOLCHAIN_ROOT).append_path("LD_LIBRARY_PATH", lib_dir);
  }

  command
}
