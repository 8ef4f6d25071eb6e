//! Implementation of `tpbuild [TARGET]`.
//!
//! Builds the requested target (or `all`) through the engine, or prints the
//! plan with `--dry-run`.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use tpbuild_lib::config::{Config, TriggerMode};
use tpbuild_lib::engine::{Engine, Plan, PlanStatus, RunReport};
use tpbuild_lib::recipe::Registry;
use tpbuild_lib::tracker::Request;

use crate::output::{
  OutputFormat, format_duration, print_info, print_json, print_planned, print_stat, print_success, print_warning,
};

pub struct BuildOptions {
  pub root: Option<PathBuf>,
  pub jobs: Option<usize>,
  pub transitive: bool,
  pub dry_run: bool,
}

#[derive(Serialize)]
struct RunOutput<'a> {
  #[serde(flatten)]
  report: &'a RunReport,
  duration_ms: u128,
}

pub fn cmd_build(registry: &Registry, target: &str, options: &BuildOptions, output: OutputFormat) -> Result<()> {
  let start = Instant::now();

  let mut config = Config::from_env(options.root.as_deref()).context("Failed to load configuration")?;
  if let Some(jobs) = options.jobs {
    config = config.with_jobs(jobs);
  }
  if options.transitive {
    config = config.with_trigger(TriggerMode::Transitive);
  }

  debug!(
    root = %config.layout.root.display(),
    jobs = config.jobs,
    trigger = ?config.trigger,
    "options resolved"
  );

  let request = Request::parse(target, registry)?;
  let engine = Engine::new(&config, registry);

  if options.dry_run {
    let plan = engine.plan(&request).context("Failed to plan build")?;
    if output.is_json() {
      print_json(&plan)?;
    } else {
      print_plan(&plan);
    }
    return Ok(());
  }

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(engine.run(&request)).context("Build failed")?;
  let elapsed = start.elapsed();

  if output.is_json() {
    print_json(&RunOutput {
      report: &report,
      duration_ms: elapsed.as_millis(),
    })?;
  } else {
    print_report(&report);
    print_stat("Duration", &format_duration(elapsed));
  }

  Ok(())
}

fn names(names: impl IntoIterator<Item = impl AsRef<str>>) -> String {
  let joined: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
  if joined.is_empty() {
    "none".to_string()
  } else {
    joined.join(", ")
  }
}

fn print_plan(plan: &Plan) {
  print_info(&format!("Plan for '{}' ({} triggering)", plan.request, trigger_label(plan.trigger)));
  println!();

  for target in &plan.targets {
    let build = target.status == PlanStatus::Build;
    print_planned(&target.name, build, target.backend);
    for command in &target.commands {
      println!("      {command}");
    }
  }

  println!();
  print_stat("To build", &plan.to_build().count().to_string());
  print_stat("Not selected", &names(&plan.not_selected));
}

fn print_report(report: &RunReport) {
  println!();
  if report.built.is_empty() {
    print_info(&format!("Nothing to do for '{}'", report.request));
  } else {
    print_success(&format!("Built {} target(s)", report.built.len()));
  }

  for collision in report.built.iter().flat_map(|t| &t.staged.collisions) {
    print_warning(&format!(
      "{} overwritten by {}",
      collision.file.display(),
      collision.replacement.display()
    ));
  }

  print_stat("Built", &names(report.built.iter().map(|t| t.name.as_str())));
  print_stat("Up to date", &names(&report.up_to_date));
}

fn trigger_label(trigger: TriggerMode) -> &'static str {
  match trigger {
    TriggerMode::OneHop => "one-hop",
    TriggerMode::Transitive => "transitive",
  }
}
