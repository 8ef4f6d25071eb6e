mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use tpbuild_lib::consts::{ALL_TARGET, CLEAN_TARGET};
use tpbuild_lib::platform::Os;
use tpbuild_lib::recipe::Registry;

use crate::cmd::BuildOptions;
use crate::output::{OutputFormat, format_error, print_error};

/// Build the third-party C/C++ dependencies into a shared stage tree
#[derive(Parser)]
#[command(name = "tpbuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Target to build, `all`, or `clean`
  #[arg(default_value = ALL_TARGET)]
  target: String,

  /// Project root containing pkgs/ and patches/ (default: TPBUILD_ROOT or the current directory)
  #[arg(long)]
  root: Option<PathBuf>,

  /// Parallelism hint for native builds
  #[arg(short, long)]
  jobs: Option<usize>,

  /// Build the full prerequisite closure instead of declared dependents only
  #[arg(long)]
  transitive: bool,

  /// Print what would be built without doing anything
  #[arg(long)]
  dry_run: bool,

  /// Output format
  #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  /// Enable verbose output
  #[arg(short, long)]
  verbose: bool,
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let Some(os) = Os::current() else {
    print_error(&format!("unsupported platform: {}", std::env::consts::OS));
    return ExitCode::FAILURE;
  };
  let registry = match Registry::builtin(os) {
    Ok(registry) => registry,
    Err(err) => {
      print_error(&format!("invalid recipe table: {err}"));
      return ExitCode::FAILURE;
    }
  };

  let allowed = registry.allowed_targets();
  if !allowed.contains(&cli.target) {
    eprintln!("{}", Cli::command().render_usage());
    eprintln!();
    eprintln!("unknown target '{}'; expected one of: {}", cli.target, allowed.join(", "));
    return ExitCode::FAILURE;
  }

  let result = if cli.target == CLEAN_TARGET {
    cmd::cmd_clean(cli.root.as_deref(), cli.output)
  } else {
    let options = BuildOptions {
      root: cli.root,
      jobs: cli.jobs,
      transitive: cli.transitive,
      dry_run: cli.dry_run,
    };
    cmd::cmd_build(&registry, &cli.target, &options, cli.output)
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format_error(&err));
      ExitCode::FAILURE
    }
  }
}
