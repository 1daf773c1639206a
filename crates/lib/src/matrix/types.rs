//! Target descriptor types for the build matrix.
//!
//! A matrix is an ordered list of [`TargetDescriptor`]s, one per build
//! variant. Descriptors are defined statically at pipeline-definition time and
//! are immutable for the duration of a run.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use semver::Version;

use crate::platform::{Arch, Os};

/// One build variant: which platform to build for, what the build procedure
/// is, and which file it must produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
  /// Operating system the build must run on.
  pub os: Os,

  /// CPU architecture, when the build procedure needs it spelled out.
  pub arch: Option<Arch>,

  /// Exact file name the build procedure must produce, and the exact asset
  /// name it is published under. Unique within one matrix.
  pub artifact: String,

  /// External build procedure to invoke: a command name, or a path relative
  /// to the working directory.
  pub script: String,

  /// Arguments passed to the build procedure (e.g. an architecture flag).
  pub args: Vec<String>,

  /// Working directory for the build, relative to the source root.
  pub cwd: Option<PathBuf>,

  /// Directory the artifact lands in, relative to the working directory.
  pub artifact_dir: Option<PathBuf>,

  /// Toolchain prerequisites that must be satisfied before the build runs.
  pub requires: Vec<ToolRequirement>,
}

/// A named toolchain prerequisite, optionally version-constrained and
/// optionally scoped to one OS.
///
/// Parsed from strings like `"nasm"`, `"clang>=11"` or `"windows:nasm"`.
/// A requirement scoped to an OS other than the target's is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequirement {
  /// Tool binary name, probed on PATH.
  pub tool: String,

  /// Minimum acceptable version, when constrained.
  pub min_version: Option<Version>,

  /// Restricts the requirement to targets of this OS.
  pub only_os: Option<Os>,
}

impl ToolRequirement {
  /// Returns true if this requirement applies to a target of the given OS.
  pub fn applies_to(&self, os: Os) -> bool {
    self.only_os.is_none_or(|only| only == os)
  }
}

impl fmt::Display for ToolRequirement {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if let Some(os) = self.only_os {
      write!(f, "{os}:")?;
    }
    write!(f, "{}", self.tool)?;
    if let Some(version) = &self.min_version {
      write!(f, ">={version}")?;
    }
    Ok(())
  }
}

impl FromStr for ToolRequirement {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    if s.is_empty() {
      return Err("empty requirement".to_string());
    }

    let (only_os, rest) = match s.split_once(':') {
      Some((os, rest)) => (Some(os.parse::<Os>()?), rest),
      None => (None, s),
    };

    let (tool, min_version) = match rest.split_once(">=") {
      Some((tool, version)) => {
        let version = parse_loose_version(version)
          .ok_or_else(|| format!("invalid version constraint `{version}`"))?;
        (tool.trim(), Some(version))
      }
      None => (rest.trim(), None),
    };

    if tool.is_empty() {
      return Err("missing tool name".to_string());
    }

    Ok(Self {
      tool: tool.to_string(),
      min_version,
      only_os,
    })
  }
}

/// Parse a version that may omit minor/patch components (`"11"`, `"2.15"`).
///
/// Leading zeros are stripped per component since semver rejects them
/// (`nasm` prints versions like `2.15.05`).
pub fn parse_loose_version(s: &str) -> Option<Version> {
  let core: String = s
    .trim()
    .chars()
    .take_while(|c| c.is_ascii_digit() || *c == '.')
    .collect();
  let core = core.trim_matches('.');
  if core.is_empty() {
    return None;
  }

  let mut parts: Vec<String> = core
    .split('.')
    .map(|p| {
      let trimmed = p.trim_start_matches('0');
      if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() }
    })
    .collect();
  while parts.len() < 3 {
    parts.push("0".to_string());
  }

  Version::parse(&parts[..3].join(".")).ok()
}
