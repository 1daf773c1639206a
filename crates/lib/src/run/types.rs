//! Types for run orchestration: outcomes, policies, configuration and the
//! aggregate report.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::publish::RetryPolicy;

/// Where a pipeline instance is in its life, used for logging and for
/// cancellation diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Provisioning,
  Building,
  Validating,
  Publishing,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Stage::Provisioning => "provisioning",
      Stage::Building => "building",
      Stage::Validating => "validating",
      Stage::Publishing => "publishing",
    };
    write!(f, "{s}")
  }
}

/// Terminal status of one target's pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
  /// All stages completed; the artifact was published (or validated, when
  /// publishing is skipped).
  Succeeded,

  /// A required toolchain could not be provisioned.
  ProvisionFailed,

  /// The build procedure returned failure.
  BuildFailed,

  /// The build exited zero but the declared artifact is absent. Usually a
  /// matrix/script mismatch rather than a compiler error.
  ArtifactMissing,

  /// Publishing failed after exhausting retries.
  UploadFailed,

  /// The instance was cancelled under fail-fast before it finished.
  Cancelled,
}

impl fmt::Display for OutcomeStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      OutcomeStatus::Succeeded => "succeeded",
      OutcomeStatus::ProvisionFailed => "provision failed",
      OutcomeStatus::BuildFailed => "build failed",
      OutcomeStatus::ArtifactMissing => "artifact missing",
      OutcomeStatus::UploadFailed => "upload failed",
      OutcomeStatus::Cancelled => "cancelled",
    };
    write!(f, "{s}")
  }
}

/// Result of one target's pipeline instance.
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
  /// The artifact (and asset) name this outcome belongs to.
  pub artifact: String,

  /// Terminal status.
  pub status: OutcomeStatus,

  /// Path of the validated artifact; populated only on success.
  pub artifact_path: Option<PathBuf>,

  /// Captured output or error text for failure triage; verbatim.
  pub diagnostics: String,
}

impl BuildOutcome {
  pub fn succeeded(artifact: &str, artifact_path: PathBuf) -> Self {
    Self {
      artifact: artifact.to_string(),
      status: OutcomeStatus::Succeeded,
      artifact_path: Some(artifact_path),
      diagnostics: String::new(),
    }
  }

  pub fn failed(artifact: &str, status: OutcomeStatus, diagnostics: String) -> Self {
    Self {
      artifact: artifact.to_string(),
      status,
      artifact_path: None,
      diagnostics,
    }
  }

  pub fn cancelled(artifact: &str, before: Stage) -> Self {
    Self::failed(
      artifact,
      OutcomeStatus::Cancelled,
      format!("cancelled before {before}"),
    )
  }

  pub fn is_success(&self) -> bool {
    self.status == OutcomeStatus::Succeeded
  }
}

/// How sibling targets react to one target's failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
  /// First failure cancels all still-pending and in-flight instances.
  FailFast,

  /// Every instance runs to completion regardless of siblings.
  #[default]
  FailIndependent,
}

/// Identifies where artifacts are published: the release for the tag that
/// triggered the run. All targets in one run publish to the same tag.
#[derive(Debug, Clone)]
pub struct ReleaseTarget {
  pub tag: String,
}

impl ReleaseTarget {
  pub fn new(tag: impl Into<String>) -> Self {
    Self { tag: tag.into() }
  }
}

/// Per-stage timeouts. `None` means no limit; exceeding a limit converts the
/// stage into its corresponding failure outcome.
#[derive(Debug, Clone, Default)]
pub struct StageTimeouts {
  pub provision: Option<Duration>,
  pub build: Option<Duration>,
  pub upload: Option<Duration>,
}

/// Configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
  /// Root of the checked-out source tree; target working directories
  /// resolve under it.
  pub source_root: PathBuf,

  /// Maximum number of pipeline instances in flight at once.
  pub parallelism: usize,

  /// Aggregation policy across targets.
  pub policy: FailurePolicy,

  /// Per-stage timeouts.
  pub timeouts: StageTimeouts,

  /// Retry policy for uploads.
  pub retry: RetryPolicy,

  /// Stop each instance after validation instead of publishing.
  pub skip_publish: bool,

  /// Whether the provisioner may invoke platform installers for missing
  /// tools. When false, a missing tool fails the target immediately.
  pub install_missing: bool,
}

impl Default for RunConfig {
  fn default() -> Self {
    Self {
      source_root: PathBuf::from("."),
      parallelism: default_parallelism(),
      policy: FailurePolicy::default(),
      timeouts: StageTimeouts::default(),
      retry: RetryPolicy::default(),
      skip_publish: false,
      install_missing: true,
    }
  }
}

fn default_parallelism() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

/// Aggregate report of one run: one outcome per matrix target, in matrix
/// order.
#[derive(Debug, Serialize)]
pub struct RunReport {
  pub outcomes: Vec<BuildOutcome>,
}

impl RunReport {
  pub fn new(outcomes: Vec<BuildOutcome>) -> Self {
    Self { outcomes }
  }

  /// Overall success: every instance succeeded.
  pub fn is_success(&self) -> bool {
    self.outcomes.iter().all(BuildOutcome::is_success)
  }

  /// Status of the named artifact, when it appears in the report.
  pub fn status_of(&self, artifact: &str) -> Option<OutcomeStatus> {
    self
      .outcomes
      .iter()
      .find(|o| o.artifact == artifact)
      .map(|o| o.status)
  }

  /// Outcomes that did not succeed.
  pub fn failures(&self) -> impl Iterator<Item = &BuildOutcome> {
    self.outcomes.iter().filter(|o| !o.is_success())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_report_is_success() {
    assert!(RunReport::new(vec![]).is_success());
  }

  #[test]
  fn report_success_requires_all_succeeded() {
    let report = RunReport::new(vec![
      BuildOutcome::succeeded("a.so", PathBuf::from("/tmp/a.so")),
      BuildOutcome::failed("b.so", OutcomeStatus::BuildFailed, "boom".into()),
    ]);
    assert!(!report.is_success());
    assert_eq!(report.status_of("a.so"), Some(OutcomeStatus::Succeeded));
    assert_eq!(report.status_of("b.so"), Some(OutcomeStatus::BuildFailed));
    assert_eq!(report.status_of("c.so"), None);
    assert_eq!(report.failures().count(), 1);
  }

  #[test]
  fn cancelled_outcome_names_the_stage() {
    let outcome = BuildOutcome::cancelled("a.so", Stage::Validating);
    assert_eq!(outcome.status, OutcomeStatus::Cancelled);
    assert!(outcome.diagnostics.contains("validating"));
  }

  #[test]
  fn statuses_serialize_snake_case() {
    let json = serde_json::to_string(&OutcomeStatus::ArtifactMissing).unwrap();
    assert_eq!(json, r#""artifact_missing""#);
  }

  #[test]
  fn default_config_is_independent_and_publishing() {
    let config = RunConfig::default();
    assert_eq!(config.policy, FailurePolicy::FailIndependent);
    assert!(!config.skip_publish);
    assert!(config.parallelism >= 1);
  }
}
