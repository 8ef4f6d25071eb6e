//! Implementation of `tpbuild clean`.
//!
//! Removes `build/` and `stage/` below the project root. The engine is not
//! involved.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use tpbuild_lib::clean::clean;
use tpbuild_lib::config::Config;

use crate::output::{OutputFormat, format_bytes, format_duration, print_info, print_json, print_stat, print_success};

pub fn cmd_clean(root: Option<&Path>, output: OutputFormat) -> Result<()> {
  let start = Instant::now();

  let config = Config::from_env(root).context("Failed to load configuration")?;
  let report = clean(&config.layout).context("Clean failed")?;

  if output.is_json() {
    print_json(&report)?;
  } else if report.deleted_paths.is_empty() {
    print_info("Nothing to clean");
  } else {
    print_success("Clean complete!");
    for path in &report.deleted_paths {
      print_stat("Removed", &path.display().to_string());
    }
    print_stat("Space freed", &format_bytes(report.bytes_freed));
    print_stat("Duration", &format_duration(start.elapsed()));
  }

  Ok(())
}
