//! Build procedure execution.
//!
//! The build procedure is an opaque external collaborator: it is invoked with
//! the descriptor's arguments inside the provisioned working directory, and
//! only its exit status and combined output stream are interpreted.

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::matrix::TargetDescriptor;
use crate::provision::BuildEnvironment;

/// Exit status and captured output of one build procedure invocation.
#[derive(Debug, Clone)]
pub struct BuildOutput {
  /// Whether the procedure exited successfully.
  pub success: bool,

  /// Exit code, when the procedure exited normally.
  pub exit_code: Option<i32>,

  /// Combined stdout and stderr, preserved verbatim for failure triage.
  pub output: String,
}

/// Errors raised while invoking a build procedure.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// The procedure could not be spawned at all.
  #[error("failed to spawn build procedure `{script}`: {source}")]
  Spawn {
    script: String,
    #[source]
    source: std::io::Error,
  },
}

/// Invoke the target's build procedure inside the prepared environment.
///
/// The descriptor's environment variables are merged over the inherited
/// environment. A script containing a path separator is resolved against the
/// working directory; a bare name is resolved on PATH.
pub async fn execute(
  descriptor: &TargetDescriptor,
  env: &BuildEnvironment,
) -> Result<BuildOutput, ExecuteError> {
  let program = resolve_program(descriptor, env);

  info!(
    target = %descriptor.artifact,
    script = %program.display(),
    args = ?descriptor.args,
    "invoking build procedure"
  );

  let output = Command::new(&program)
    .args(&descriptor.args)
    .current_dir(&env.working_directory)
    .envs(&env.env)
    // The caller may drop this future on a stage timeout; the child must
    // not keep writing into the working directory afterwards.
    .kill_on_drop(true)
    .output()
    .await
    .map_err(|source| ExecuteError::Spawn {
      script: descriptor.script.clone(),
      source,
    })?;

  let combined = combine_output(&output.stdout, &output.stderr);

  if output.status.success() {
    debug!(target = %descriptor.artifact, "build procedure succeeded");
  } else {
    debug!(
      target = %descriptor.artifact,
      code = ?output.status.code(),
      "build procedure failed"
    );
  }

  Ok(BuildOutput {
    success: output.status.success(),
    exit_code: output.status.code(),
    output: combined,
  })
}

fn resolve_program(descriptor: &TargetDescriptor, env: &BuildEnvironment) -> std::path::PathBuf {
  if descriptor.script.contains('/') || descriptor.script.contains('\\') {
    env.working_directory.join(&descriptor.script)
  } else {
    std::path::PathBuf::from(&descriptor.script)
  }
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
  let stdout = String::from_utf8_lossy(stdout);
  let stderr = String::from_utf8_lossy(stderr);
  match (stdout.is_empty(), stderr.is_empty()) {
    (true, true) => String::new(),
    (false, true) => stdout.into_owned(),
    (true, false) => stderr.into_owned(),
    (false, false) => format!("{stdout}\n{stderr}"),
  }
}
