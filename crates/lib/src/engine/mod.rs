//! Orchestration engine.
//!
//! The engine walks the registry in order and, for every selected target
//! without a marker, runs the pipeline
//!
//! 1. acquire: extract the archive or check the checkout/prebuilt tree
//! 2. prepare: patches and appended lines
//! 3. build: the recipe backend, if any
//! 4. stage: copy headers and libraries into `stage/`
//! 5. mark: write the completion marker
//!
//! Everything runs sequentially. The first failure stops the whole run and
//! leaves the failing target without a marker, so the next invocation
//! retries it.

mod resolver;
mod types;

pub use resolver::TargetResolver;
pub use types::{BuildError, Plan, PlanStatus, PlannedTarget, RunReport, Stage, StageFailure, TargetReport};

use std::collections::HashSet;

use tracing::{debug, error, info};

use crate::acquire::{acquire, prepare};
use crate::backend::{self, Lookup};
use crate::config::Config;
use crate::recipe::{Recipe, Registry};
use crate::stage::Stager;
use crate::tracker::{self, Request};

fn failed<E: Into<StageFailure>>(target: &str, stage: Stage) -> impl FnOnce(E) -> BuildError {
  move |err| BuildError {
    target: target.to_string(),
    stage,
    source: err.into(),
  }
}

pub struct Engine<'a> {
  config: &'a Config,
  registry: &'a Registry,
}

impl<'a> Engine<'a> {
  pub fn new(config: &'a Config, registry: &'a Registry) -> Self {
    Self { config, registry }
  }

  /// Build everything `request` selects that is not already complete.
  pub async fn run(&self, request: &Request) -> Result<RunReport, BuildError> {
    let selected = tracker::select(self.registry, request, self.config.trigger);
    info!(request = %request, selected = selected.len(), trigger = ?self.config.trigger, "starting run");

    let mut stager = Stager::new(&self.config.layout);
    let mut report = RunReport {
      request: request.to_string(),
      trigger: self.config.trigger,
      built: Vec::new(),
      up_to_date: Vec::new(),
    };

    for recipe in selected {
      if tracker::is_complete(&self.config.layout, &recipe.name) {
        debug!(target_name = %recipe.name, "up to date");
        report.up_to_date.push(recipe.name.clone());
        continue;
      }

      info!(target_name = %recipe.name, "building target");
      match self.run_target(recipe, &mut stager).await {
        Ok(target) => {
          info!(target_name = %recipe.name, "target complete");
          report.built.push(target);
        }
        Err(err) => {
          error!(target_name = %err.target, stage = %err.stage, error = %err.source, "target failed");
          return Err(err);
        }
      }
    }

    info!(
      built = report.built.len(),
      up_to_date = report.up_to_date.len(),
      "run complete"
    );

    Ok(report)
  }

  async fn run_target(&self, recipe: &Recipe, stager: &mut Stager<'_>) -> Result<TargetReport, BuildError> {
    let name = recipe.name.as_str();
    let config = self.config;
    let mut resolver = TargetResolver::new(config, self.registry, name);

    debug!(target_name = %name, stage = %Stage::Acquire, "entering stage");
    let source = resolver
      .resolve_source(&recipe.source)
      .map_err(failed(name, Stage::Acquire))?;
    let acquired = acquire(&source).map_err(failed(name, Stage::Acquire))?;
    resolver.set_src(acquired.source_dir.clone());

    debug!(target_name = %name, stage = %Stage::Prepare, "entering stage");
    let prepared = prepare(config, &recipe.prepare, &acquired, &resolver)
      .await
      .map_err(failed(name, Stage::Prepare))?;

    if let Some(invocation) = resolver
      .resolve_backend(&recipe.backend)
      .map_err(failed(name, Stage::Build))?
    {
      info!(target_name = %name, backend = recipe.backend.kind(), "building");
      backend::build(config, &invocation)
        .await
        .map_err(failed(name, Stage::Build))?;
    }

    debug!(target_name = %name, stage = %Stage::Stage, "entering stage");
    let staging = resolver
      .resolve_staging(&recipe.staging)
      .map_err(failed(name, Stage::Stage))?;
    let staged = stager.stage(name, &staging).map_err(failed(name, Stage::Stage))?;

    tracker::mark_complete(&config.layout, name).map_err(failed(name, Stage::Mark))?;

    Ok(TargetReport {
      name: name.to_string(),
      source_dir: acquired.source_dir,
      extracted: acquired.extracted,
      prepared,
      staged,
    })
  }

  /// What [`run`](Self::run) would do. Nothing is extracted, written or
  /// executed; tools are not looked up.
  pub fn plan(&self, request: &Request) -> Result<Plan, BuildError> {
    let selected = tracker::select(self.registry, request, self.config.trigger);
    let selected_names: HashSet<&str> = selected.iter().map(|r| r.name.as_str()).collect();

    let mut targets = Vec::with_capacity(selected.len());
    for recipe in &selected {
      if tracker::is_complete(&self.config.layout, &recipe.name) {
        targets.push(PlannedTarget {
          name: recipe.name.clone(),
          status: PlanStatus::UpToDate,
          backend: recipe.backend.kind(),
          source_dir: None,
          commands: Vec::new(),
        });
        continue;
      }
      targets.push(self.plan_target(recipe)?);
    }

    let not_selected = self
      .registry
      .recipes()
      .iter()
      .filter(|r| !selected_names.contains(r.name.as_str()))
      .map(|r| r.name.clone())
      .collect();

    Ok(Plan {
      request: request.to_string(),
      trigger: self.config.trigger,
      targets,
      not_selected,
    })
  }

  fn plan_target(&self, recipe: &Recipe) -> Result<PlannedTarget, BuildError> {
    let name = recipe.name.as_str();
    let mut resolver = TargetResolver::new(self.config, self.registry, name);

    let source = resolver
      .resolve_source(&recipe.source)
      .map_err(failed(name, Stage::Acquire))?;
    let source_dir = source.source_dir();
    resolver.set_src(source_dir.clone());

    let mut commands = Vec::new();
    if let Some(invocation) = resolver
      .resolve_backend(&recipe.backend)
      .map_err(failed(name, Stage::Build))?
    {
      let steps = backend::steps(self.config, &invocation, Lookup::Verbatim).map_err(failed(name, Stage::Build))?;
      commands.extend(steps.iter().map(|step| step.command.command_line()));
    }

    Ok(PlannedTarget {
      name: name.to_string(),
      status: PlanStatus::Build,
      backend: recipe.backend.kind(),
      source_dir: Some(source_dir),
      commands,
    })
  }
}
