//! relmatrix - matrix-driven build-and-release runner.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use cmd::{RunArgs, cmd_plan, cmd_run, cmd_validate};
use output::OutputFormat;

/// relmatrix - build native artifacts across a target matrix and publish
/// them as release assets
#[derive(Parser)]
#[command(name = "relmatrix")]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every matrix target and publish the artifacts to a release tag
  Run(RunArgs),

  /// Show what a run would do, without building or publishing
  Plan {
    /// Path to the matrix file
    #[arg(short, long, default_value = "matrix.toml")]
    matrix: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
  },

  /// Check that a matrix file is well-formed
  Validate {
    /// Path to the matrix file
    #[arg(short, long, default_value = "matrix.toml")]
    matrix: PathBuf,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::Run(args) => cmd_run(args).await,
    Commands::Plan { matrix, format } => cmd_plan(&matrix, format),
    Commands::Validate { matrix } => cmd_validate(&matrix),
  }
}
