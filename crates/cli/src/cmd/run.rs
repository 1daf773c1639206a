//! Implementation of the `relmatrix run` command.
//!
//! Loads the matrix, runs every target against the release for the given
//! tag, prints the per-target report and exits non-zero if any target
//! failed.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Result, bail};
use clap::Args;
use tracing::{debug, info};

use relmatrix_lib::matrix::load_matrix;
use relmatrix_lib::publish::{ReleaseClient, RetryPolicy, token_from_env};
use relmatrix_lib::run::{
  FailurePolicy, ReleaseTarget, RunConfig, StageTimeouts, run_matrix,
};

use crate::output::{
  OutputFormat, format_duration, print_error, print_info, print_json, print_outcome,
  print_success,
};

/// Environment variables consulted for the repository slug, in order.
const REPO_ENV_VARS: [&str; 2] = ["RELMATRIX_REPO", "GITHUB_REPOSITORY"];

#[derive(Debug, Args)]
pub struct RunArgs {
  /// Release tag to publish artifacts to
  pub tag: String,

  /// Path to the matrix file
  #[arg(short, long, default_value = "matrix.toml")]
  pub matrix: PathBuf,

  /// Source root the build working directories resolve under
  #[arg(short, long, default_value = ".")]
  pub source: PathBuf,

  /// Repository slug (owner/name); defaults to $RELMATRIX_REPO or $GITHUB_REPOSITORY
  #[arg(short, long)]
  pub repo: Option<String>,

  /// Base URL of the release API
  #[arg(long, default_value = "https://api.github.com")]
  pub api_url: String,

  /// Cancel remaining targets after the first failure
  #[arg(long)]
  pub fail_fast: bool,

  /// Maximum targets in flight at once; defaults to the CPU count
  #[arg(short = 'j', long)]
  pub parallelism: Option<usize>,

  /// Build and validate artifacts without uploading anything
  #[arg(long)]
  pub skip_publish: bool,

  /// Fail targets whose tools are missing instead of installing them
  #[arg(long)]
  pub no_install: bool,

  /// Time limit for provisioning one target (e.g. "5m")
  #[arg(long)]
  pub provision_timeout: Option<humantime::Duration>,

  /// Time limit for one build procedure (e.g. "30m")
  #[arg(long)]
  pub build_timeout: Option<humantime::Duration>,

  /// Time limit for uploading one artifact (e.g. "10m")
  #[arg(long)]
  pub upload_timeout: Option<humantime::Duration>,

  /// Upload attempts per artifact before giving up
  #[arg(long, default_value_t = 3)]
  pub retry_attempts: u32,

  /// Output format
  #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
  pub format: OutputFormat,
}

pub async fn cmd_run(args: RunArgs) -> Result<()> {
  let targets = load_matrix(&args.matrix)?;
  info!(
    matrix = %args.matrix.display(),
    targets = targets.len(),
    "matrix loaded"
  );

  let client = if args.skip_publish {
    None
  } else {
    let repo = resolve_repo(args.repo.as_deref())?;
    let Some(token) = token_from_env() else {
      bail!("no upload credential found; set RELMATRIX_TOKEN or GITHUB_TOKEN");
    };
    Some(ReleaseClient::new(&args.api_url, &repo, token))
  };

  let mut config = RunConfig {
    source_root: args.source.clone(),
    policy: if args.fail_fast {
      FailurePolicy::FailFast
    } else {
      FailurePolicy::FailIndependent
    },
    timeouts: StageTimeouts {
      provision: args.provision_timeout.map(Into::into),
      build: args.build_timeout.map(Into::into),
      upload: args.upload_timeout.map(Into::into),
    },
    retry: RetryPolicy {
      attempts: args.retry_attempts,
      ..RetryPolicy::default()
    },
    skip_publish: args.skip_publish,
    install_missing: !args.no_install,
    ..RunConfig::default()
  };
  if let Some(parallelism) = args.parallelism {
    config.parallelism = parallelism.max(1);
  }

  if !args.format.is_json() {
    print_info(&format!(
      "Running {} target{} for tag {}",
      targets.len(),
      if targets.len() == 1 { "" } else { "s" },
      args.tag
    ));
  }

  info!(tag = %args.tag, skip_publish = args.skip_publish, "starting run");
  let started = Instant::now();
  let report = run_matrix(&targets, &ReleaseTarget::new(&args.tag), client, &config).await;
  let elapsed = started.elapsed();
  debug!(elapsed = ?elapsed, success = report.is_success(), "run returned");

  if args.format.is_json() {
    print_json(&report)?;
  } else {
    println!();
    for outcome in &report.outcomes {
      print_outcome(&outcome.artifact, outcome.status);
      if !outcome.is_success() && !outcome.diagnostics.is_empty() {
        for line in outcome.diagnostics.lines().take(20) {
          eprintln!("    {line}");
        }
      }
    }
    println!();
    let failed = report.failures().count();
    if failed == 0 {
      print_success(&format!(
        "All {} target(s) finished in {}",
        report.outcomes.len(),
        format_duration(elapsed)
      ));
    } else {
      print_error(&format!(
        "{failed} of {} target(s) failed ({})",
        report.outcomes.len(),
        format_duration(elapsed)
      ));
    }
  }

  if !report.is_success() {
    std::process::exit(1);
  }
  Ok(())
}

fn resolve_repo(flag: Option<&str>) -> Result<String> {
  if let Some(repo) = flag {
    return Ok(repo.to_string());
  }
  for key in REPO_ENV_VARS {
    if let Ok(value) = std::env::var(key)
      && !value.trim().is_empty()
    {
      return Ok(value);
    }
  }
  bail!("no repository given; pass --repo or set RELMATRIX_REPO / GITHUB_REPOSITORY");
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn repo_flag_wins_over_env() {
    temp_env::with_vars([("RELMATRIX_REPO", Some("env/repo"))], || {
      assert_eq!(resolve_repo(Some("flag/repo")).unwrap(), "flag/repo");
    });
  }

  #[test]
  #[serial]
  fn repo_falls_back_to_env() {
    temp_env::with_vars(
      [
        ("RELMATRIX_REPO", None),
        ("GITHUB_REPOSITORY", Some("ci/repo")),
      ],
      || {
        assert_eq!(resolve_repo(None).unwrap(), "ci/repo");
      },
    );
  }

  #[test]
  #[serial]
  fn missing_repo_is_an_error() {
    temp_env::with_vars(
      [
        ("RELMATRIX_REPO", None::<&str>),
        ("GITHUB_REPOSITORY", None::<&str>),
      ],
      || {
        assert!(resolve_repo(None).is_err());
      },
    );
  }
}
