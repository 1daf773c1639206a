//! One target's pipeline instance.
//!
//! Runs provision, build, validate and publish in order, mapping each stage
//! failure to its terminal outcome. Cancellation is cooperative: the watch
//! channel is consulted between stages, so an in-flight stage always runs to
//! completion before the instance stops.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::matrix::TargetDescriptor;
use crate::publish::ReleaseClient;
use crate::{artifact, execute, provision, publish};

use super::types::{BuildOutcome, OutcomeStatus, RunConfig, Stage};

pub(super) async fn run_target(
  descriptor: &TargetDescriptor,
  tag: &str,
  client: Option<&ReleaseClient>,
  config: &RunConfig,
  cancelled: &watch::Receiver<bool>,
) -> BuildOutcome {
  let artifact_name = descriptor.artifact.as_str();

  if *cancelled.borrow() {
    return BuildOutcome::cancelled(artifact_name, Stage::Provisioning);
  }

  info!(target = artifact_name, os = %descriptor.os, "provisioning");
  let env = match bounded(
    config.timeouts.provision,
    provision::provision(descriptor, &config.source_root, config.install_missing),
  )
  .await
  {
    Some(Ok(env)) => env,
    Some(Err(err)) => {
      warn!(target = artifact_name, error = %err, "provisioning failed");
      return BuildOutcome::failed(artifact_name, OutcomeStatus::ProvisionFailed, err.to_string());
    }
    None => {
      return timed_out(artifact_name, Stage::Provisioning, OutcomeStatus::ProvisionFailed, config.timeouts.provision);
    }
  };

  if *cancelled.borrow() {
    return BuildOutcome::cancelled(artifact_name, Stage::Building);
  }

  let build = match bounded(config.timeouts.build, execute::execute(descriptor, &env)).await {
    Some(Ok(output)) => output,
    Some(Err(err)) => {
      warn!(target = artifact_name, error = %err, "build procedure could not run");
      return BuildOutcome::failed(artifact_name, OutcomeStatus::BuildFailed, err.to_string());
    }
    None => {
      return timed_out(artifact_name, Stage::Building, OutcomeStatus::BuildFailed, config.timeouts.build);
    }
  };

  if !build.success {
    let code = build
      .exit_code
      .map(|c| c.to_string())
      .unwrap_or_else(|| "signal".to_string());
    warn!(target = artifact_name, code = %code, "build procedure failed");
    return BuildOutcome::failed(
      artifact_name,
      OutcomeStatus::BuildFailed,
      format!("build exited with {code}\n{}", build.output),
    );
  }

  if *cancelled.borrow() {
    return BuildOutcome::cancelled(artifact_name, Stage::Validating);
  }

  let artifact_path = match artifact::locate(descriptor, &env.working_directory) {
    Some(path) => path,
    None => {
      let expected = artifact::expected_path(descriptor, &env.working_directory);
      warn!(target = artifact_name, expected = %expected.display(), "artifact absent after successful build");
      return BuildOutcome::failed(
        artifact_name,
        OutcomeStatus::ArtifactMissing,
        format!("build succeeded but `{}` was not produced", expected.display()),
      );
    }
  };

  if config.skip_publish {
    info!(target = artifact_name, "validated, publishing skipped");
    return BuildOutcome::succeeded(artifact_name, artifact_path);
  }

  let Some(client) = client else {
    return BuildOutcome::failed(
      artifact_name,
      OutcomeStatus::UploadFailed,
      "no release client configured".to_string(),
    );
  };

  if *cancelled.borrow() {
    return BuildOutcome::cancelled(artifact_name, Stage::Publishing);
  }

  match bounded(
    config.timeouts.upload,
    publish::publish(client, &artifact_path, artifact_name, tag, &config.retry),
  )
  .await
  {
    Some(Ok(())) => BuildOutcome::succeeded(artifact_name, artifact_path),
    Some(Err(err)) => {
      warn!(target = artifact_name, error = %err, "publish failed");
      BuildOutcome::failed(artifact_name, OutcomeStatus::UploadFailed, err.to_string())
    }
    None => timed_out(artifact_name, Stage::Publishing, OutcomeStatus::UploadFailed, config.timeouts.upload),
  }
}

/// Await a stage future, bounded by an optional timeout. `None` means the
/// stage exceeded its limit.
async fn bounded<T>(limit: Option<Duration>, fut: impl Future<Output = T>) -> Option<T> {
  match limit {
    Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
    None => Some(fut.await),
  }
}

fn timed_out(
  artifact: &str,
  stage: Stage,
  status: OutcomeStatus,
  limit: Option<Duration>,
) -> BuildOutcome {
  let limit = limit.unwrap_or_default();
  warn!(target = artifact, %stage, limit = ?limit, "stage timed out");
  BuildOutcome::failed(artifact, status, format!("{stage} timed out after {limit:?}"))
}
