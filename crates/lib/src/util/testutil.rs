//! Test utilities for tpbuild-lib.
//!
//! Scratch project trees, archive builders, and shell scripts that stand in
//! for cmake, make and patch so pipeline tests never need real toolchains.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::{Config, Tools};
use crate::platform::Os;

fn append_entries<W: std::io::Write>(builder: &mut tar::Builder<W>, folder: &str, files: &[(&str, &str)]) {
  for (name, content) in files {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
      .append_data(&mut header, format!("{folder}/{name}"), content.as_bytes())
      .unwrap();
  }
}

/// Write a gzip-compressed tarball whose entries all live under `folder/`.
pub fn write_tar_gz(path: &Path, folder: &str, files: &[(&str, &str)]) {
  let encoder = flate2::write::GzEncoder::new(File::create(path).unwrap(), flate2::Compression::default());
  let mut builder = tar::Builder::new(encoder);
  append_entries(&mut builder, folder, files);
  builder.into_inner().unwrap().finish().unwrap();
}

/// Write a bzip2-compressed tarball whose entries all live under `folder/`.
pub fn write_tar_bz2(path: &Path, folder: &str, files: &[(&str, &str)]) {
  let encoder = bzip2::write::BzEncoder::new(File::create(path).unwrap(), bzip2::Compression::default());
  let mut builder = tar::Builder::new(encoder);
  append_entries(&mut builder, folder, files);
  builder.into_inner().unwrap().finish().unwrap();
}

/// Write a zip archive whose entries all live under `folder/`.
pub fn write_zip(path: &Path, folder: &str, files: &[(&str, &str)]) {
  use std::io::Write;

  let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
  for (name, content) in files {
    let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    writer.start_file(format!("{folder}/{name}"), options).unwrap();
    writer.write_all(content.as_bytes()).unwrap();
  }
  writer.finish().unwrap();
}

/// Write an executable `/bin/sh` script.
#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
  use std::os::unix::fs::PermissionsExt;

  fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
  fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// A scratch project root with `pkgs/`, `patches/` and fake tools.
///
/// Every fake tool appends `<tool> <args...>` to a shared log:
/// - `cmake` only logs
/// - `make` also creates `lib<basename of first arg>.a` in its working directory
/// - `patch` fails when the patch file contains `FAIL`
pub struct TestProject {
  pub temp: TempDir,
  pub root: PathBuf,
  pub log: PathBuf,
  tools: PathBuf,
}

impl TestProject {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    let tools = root.join("tools");
    fs::create_dir_all(root.join("pkgs")).unwrap();
    fs::create_dir_all(root.join("patches")).unwrap();
    fs::create_dir_all(&tools).unwrap();
    let log = root.join("tools.log");

    let project = Self { temp, root, log, tools };
    #[cfg(unix)]
    project.install_fake_tools();
    project
  }

  #[cfg(unix)]
  fn install_fake_tools(&self) {
    let log = self.log.display();
    write_script(&self.tools.join("cmake"), &format!("echo \"cmake $*\" >> \"{log}\""));
    write_script(
      &self.tools.join("make"),
      &format!("echo \"make $*\" >> \"{log}\"\nname=$(basename \"$1\")\ntouch \"lib$name.a\""),
    );
    write_script(
      &self.tools.join("patch"),
      &format!("echo \"patch $*\" >> \"{log}\"\nif grep -q FAIL \"$3\"; then exit 1; fi"),
    );
  }

  pub fn tools(&self) -> Tools {
    let tool = |name: &str| self.tools.join(name).to_string_lossy().into_owned();
    Tools {
      cmake: tool("cmake"),
      make: tool("make"),
      patch: tool("patch"),
      msbuild: tool("msbuild"),
    }
  }

  pub fn config(&self) -> Config {
    Config::new(&self.root, Os::Linux).with_tools(self.tools())
  }

  pub fn pkg(&self, archive: &str) -> PathBuf {
    self.root.join("pkgs").join(archive)
  }

  /// Write `patches/<relative>`.
  pub fn add_patch(&self, relative: &str, content: &str) {
    let path = self.root.join("patches").join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
  }

  /// Tool invocations so far, one per line.
  pub fn log_lines(&self) -> Vec<String> {
    fs::read_to_string(&self.log)
      .map(|content| content.lines().map(str::to_string).collect())
      .unwrap_or_default()
  }

  pub fn clear_log(&self) {
    let _ = fs::remove_file(&self.log);
  }
}
