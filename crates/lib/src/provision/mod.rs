//! Toolchain provisioning.
//!
//! Before a target's build procedure runs, each of its declared toolchain
//! requirements is checked and, when missing, installed. The result is a
//! [`BuildEnvironment`]: the working directory plus the environment variables
//! downstream build procedures need to locate the provisioned tools.
//!
//! Provisioning steps are idempotent and individually skippable: a tool that
//! is already present at an acceptable version is left alone, and a
//! requirement scoped to a different OS than the target's is a no-op, never
//! an error. Each platform gets its own [`Provisioner`] implementation,
//! selected by [`provisioner_for`], rather than inline platform conditionals.

mod linux;
mod macos;
mod probe;
mod windows;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use semver::Version;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::matrix::{TargetDescriptor, ToolRequirement};
use crate::platform::Os;

pub use linux::LinuxProvisioner;
pub use macos::MacOsProvisioner;
pub use probe::{ToolInfo, find_in_path, parse_version_output, probe_tool, resolve_library_path};
pub use windows::WindowsProvisioner;

/// Ephemeral environment for one target's build, owned exclusively by that
/// target's pipeline instance and never reused across targets.
#[derive(Debug, Clone)]
pub struct BuildEnvironment {
  /// Directory the build procedure executes in.
  pub working_directory: PathBuf,

  /// Variables injected for the build procedure, merged over the inherited
  /// environment at spawn time.
  pub env: BTreeMap<String, String>,
}

/// Errors raised while provisioning one target. Fatal to that target's
/// pipeline instance only.
#[derive(Debug, Error)]
pub enum ProvisionError {
  /// The host this process runs on is not a supported platform.
  #[error("host platform `{0}` is not supported")]
  UnsupportedHost(String),

  /// The descriptor names an OS other than the host's.
  #[error("target requires a {target} host but this host is {host}")]
  HostMismatch { target: Os, host: Os },

  /// The resolved working directory does not exist.
  #[error("working directory {0} does not exist")]
  MissingWorkingDirectory(PathBuf),

  /// A required tool could not be installed or located.
  #[error("tool `{tool}` could not be provisioned: {reason}")]
  InstallFailed { tool: String, reason: String },

  /// A required tool is present but too old, and installing did not help.
  #[error("tool `{tool}` version {found} is below required {required}")]
  VersionTooOld {
    tool: String,
    found: Version,
    required: Version,
  },
}

/// Platform-specific provisioning knowledge: how to install a tool and which
/// environment variables to derive from its location.
pub trait Provisioner: Send + Sync {
  /// The OS this provisioner serves.
  fn os(&self) -> Os;

  /// Installer invocation for a missing tool, as argv. `None` when the
  /// platform has no managed installer for the tool.
  fn install_argv(&self, tool: &str) -> Option<Vec<String>>;

  /// Environment variables derived from an installed tool's location
  /// (e.g. a compiler-library locator).
  fn derived_env(&self, tool: &str, tool_path: &Path) -> Vec<(String, String)>;
}

/// Select the provisioner implementation for the given OS.
pub fn provisioner_for(os: Os) -> &'static dyn Provisioner {
  match os {
    Os::Linux => &LinuxProvisioner,
    Os::MacOs => &MacOsProvisioner,
    Os::Windows => &WindowsProvisioner,
  }
}

/// Provision the build environment for one target.
///
/// Checks host affinity, resolves the working directory under `source_root`,
/// then satisfies each applicable tool requirement in order. When
/// `install_missing` is false, absent tools fail immediately instead of
/// invoking the platform installer.
pub async fn provision(
  descriptor: &TargetDescriptor,
  source_root: &Path,
  install_missing: bool,
) -> Result<BuildEnvironment, ProvisionError> {
  let host = Os::current()
    .ok_or_else(|| ProvisionError::UnsupportedHost(std::env::consts::OS.to_string()))?;
  if host != descriptor.os {
    return Err(ProvisionError::HostMismatch {
      target: descriptor.os,
      host,
    });
  }

  let working_directory = match &descriptor.cwd {
    Some(cwd) => source_root.join(cwd),
    None => source_root.to_path_buf(),
  };
  if !working_directory.is_dir() {
    return Err(ProvisionError::MissingWorkingDirectory(working_directory));
  }

  let provisioner = provisioner_for(descriptor.os);
  let mut env = BTreeMap::new();

  for requirement in &descriptor.requires {
    if !requirement.applies_to(descriptor.os) {
      debug!(
        tool = %requirement.tool,
        target = %descriptor.artifact,
        "requirement not applicable to this target, skipping"
      );
      continue;
    }
    let info = ensure_tool(requirement, provisioner, install_missing).await?;
    for (key, value) in provisioner.derived_env(&requirement.tool, &info.path) {
      debug!(tool = %requirement.tool, key = %key, value = %value, "derived env var");
      env.insert(key, value);
    }
  }

  info!(
    target = %descriptor.artifact,
    working_directory = %working_directory.display(),
    env_vars = env.len(),
    "environment provisioned"
  );

  Ok(BuildEnvironment {
    working_directory,
    env,
  })
}

/// Satisfy a single tool requirement: probe, install if missing, re-probe,
/// and enforce the version constraint.
async fn ensure_tool(
  requirement: &ToolRequirement,
  provisioner: &dyn Provisioner,
  install_missing: bool,
) -> Result<ToolInfo, ProvisionError> {
  let tool = requirement.tool.as_str();

  if let Some(info) = probe_tool(tool).await {
    match version_ok(requirement, &info) {
      VersionCheck::Satisfied => {
        debug!(tool, path = %info.path.display(), "requirement already satisfied");
        return Ok(info);
      }
      VersionCheck::Unknown => {
        warn!(tool, "tool reports no parseable version, accepting as-is");
        return Ok(info);
      }
      VersionCheck::TooOld(_) => {
        info!(tool, "installed version too old, attempting upgrade");
      }
    }
  } else if !install_missing {
    return Err(ProvisionError::InstallFailed {
      tool: tool.to_string(),
      reason: "not found on PATH (installation disabled)".to_string(),
    });
  }

  if install_missing {
    install_tool(tool, provisioner).await?;
  }

  let info = probe_tool(tool).await.ok_or_else(|| ProvisionError::InstallFailed {
    tool: tool.to_string(),
    reason: "still not found on PATH after install".to_string(),
  })?;

  if let VersionCheck::TooOld(found) = version_ok(requirement, &info) {
    let required = requirement
      .min_version
      .clone()
      .unwrap_or_else(|| Version::new(0, 0, 0));
    return Err(ProvisionError::VersionTooOld {
      tool: tool.to_string(),
      found,
      required,
    });
  }

  Ok(info)
}

enum VersionCheck {
  Satisfied,
  Unknown,
  TooOld(Version),
}

fn version_ok(requirement: &ToolRequirement, info: &ToolInfo) -> VersionCheck {
  match (&requirement.min_version, &info.version) {
    (None, _) => VersionCheck::Satisfied,
    (Some(_), None) => VersionCheck::Unknown,
    (Some(min), Some(found)) if found >= min => VersionCheck::Satisfied,
    (Some(_), Some(found)) => VersionCheck::TooOld(found.clone()),
  }
}

/// Invoke the platform installer for a tool.
async fn install_tool(tool: &str, provisioner: &dyn Provisioner) -> Result<(), ProvisionError> {
  let argv = provisioner
    .install_argv(tool)
    .ok_or_else(|| ProvisionError::InstallFailed {
      tool: tool.to_string(),
      reason: format!("no installer known for `{tool}` on {}", provisioner.os()),
    })?;

  info!(tool, installer = %argv.join(" "), "installing tool");

  let (program, args) = argv.split_first().ok_or_else(|| ProvisionError::InstallFailed {
    tool: tool.to_string(),
    reason: "empty installer invocation".to_string(),
  })?;

  let output = Command::new(program)
    .args(args)
    .output()
    .await
    .map_err(|e| ProvisionError::InstallFailed {
      tool: tool.to_string(),
      reason: format!("failed to run installer `{program}`: {e}"),
    })?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    return Err(ProvisionError::InstallFailed {
      tool: tool.to_string(),
      reason: format!(
        "installer exited with {:?}: {}",
        output.status.code(),
        stderr.trim()
      ),
    });
  }

  Ok(())
}
