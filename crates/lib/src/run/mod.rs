//! Run orchestration.
//!
//! Fans the target matrix out as one pipeline instance per target, bounded by
//! a semaphore, and aggregates the outcomes into a single report in matrix
//! order. Under the fail-fast policy the first failing instance flips a watch
//! channel that the others consult between stages; instances that never
//! started report `Cancelled`.

mod pipeline;
mod types;

use std::sync::Arc;

use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::matrix::TargetDescriptor;
use crate::publish::ReleaseClient;

pub use types::{
  BuildOutcome, FailurePolicy, OutcomeStatus, ReleaseTarget, RunConfig, RunReport, Stage,
  StageTimeouts,
};

/// Run the whole matrix against one release tag.
///
/// `client` may be `None` only when `config.skip_publish` is set; targets
/// that reach the publish stage without a client fail with `UploadFailed`.
pub async fn run_matrix(
  matrix: &[TargetDescriptor],
  release: &ReleaseTarget,
  client: Option<ReleaseClient>,
  config: &RunConfig,
) -> RunReport {
  info!(
    targets = matrix.len(),
    tag = %release.tag,
    parallelism = config.parallelism,
    policy = ?config.policy,
    "starting run"
  );

  let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));
  let (cancel_tx, cancel_rx) = watch::channel(false);
  let client = client.map(Arc::new);
  let config = Arc::new(config.clone());
  let tag = release.tag.clone();

  let mut tasks: JoinSet<(usize, BuildOutcome)> = JoinSet::new();
  for (index, descriptor) in matrix.iter().enumerate() {
    let descriptor = descriptor.clone();
    let semaphore = Arc::clone(&semaphore);
    let cancelled = cancel_rx.clone();
    let client = client.clone();
    let config = Arc::clone(&config);
    let tag = tag.clone();

    tasks.spawn(async move {
      // Holding the permit for the whole pipeline bounds concurrency across
      // every stage, not just the build.
      let _permit = semaphore.acquire_owned().await;
      let outcome = pipeline::run_target(
        &descriptor,
        &tag,
        client.as_deref(),
        &config,
        &cancelled,
      )
      .await;
      (index, outcome)
    });
  }

  let mut slots: Vec<Option<BuildOutcome>> = matrix.iter().map(|_| None).collect();

  while let Some(joined) = tasks.join_next().await {
    match joined {
      Ok((index, outcome)) => {
        if !outcome.is_success() && config.policy == FailurePolicy::FailFast {
          // Later sends are harmless; the channel stays true.
          let _ = cancel_tx.send(true);
        }
        info!(target = %outcome.artifact, status = %outcome.status, "target finished");
        slots[index] = Some(outcome);
      }
      Err(err) => {
        error!(error = %err, "pipeline task did not complete");
        if config.policy == FailurePolicy::FailFast {
          let _ = cancel_tx.send(true);
        }
      }
    }
  }

  let outcomes = slots
    .into_iter()
    .enumerate()
    .map(|(index, slot)| {
      slot.unwrap_or_else(|| internal_failure_outcome(&matrix[index].artifact))
    })
    .collect();

  let report = RunReport::new(outcomes);
  info!(
    succeeded = report.outcomes.iter().filter(|o| o.is_success()).count(),
    failed = report.failures().count(),
    "run finished"
  );
  report
}

/// Outcome for a target whose pipeline task never produced one (panic or
/// abort). The diagnostics name the runner itself so the report does not
/// blame the target's build procedure.
fn internal_failure_outcome(artifact: &str) -> BuildOutcome {
  BuildOutcome::failed(
    artifact,
    OutcomeStatus::BuildFailed,
    "internal: pipeline task panicked or was aborted before finishing".to_string(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn internal_failure_is_labelled_as_runner_fault() {
    let outcome = internal_failure_outcome("lib.so");
    assert_eq!(outcome.artifact, "lib.so");
    assert_eq!(outcome.status, OutcomeStatus::BuildFailed);
    assert!(outcome.diagnostics.starts_with("internal:"));
    assert!(!outcome.is_success());
  }
}
