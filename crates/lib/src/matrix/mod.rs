//! Build matrix loading and validation.
//!
//! The matrix is a TOML document with one `[[target]]` table per build
//! variant:
//!
//! ```toml
//! [[target]]
//! os = "linux"
//! arch = "x64"
//! artifact = "libnative_linux_x64.so"
//! script = "tool/build_linux.sh"
//! args = ["x64"]
//! requires = ["clang>=11"]
//! ```
//!
//! Loading is pure data with no side effects: the matrix is read once per run
//! and treated as immutable input. All validation happens here, before any
//! target starts, so a malformed matrix aborts the whole run up front.

mod types;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::platform::{Arch, Os};

pub use types::{TargetDescriptor, ToolRequirement, parse_loose_version};

/// Errors detected while loading the matrix. Fatal to the whole run.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// Matrix file could not be read.
  #[error("failed to read matrix file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Matrix file is not valid TOML (or has a field of the wrong type).
  #[error("failed to parse matrix: {0}")]
  Parse(#[from] toml::de::Error),

  /// A target is missing one of the mandatory fields.
  #[error("target #{index} is missing mandatory field `{field}`")]
  MissingField { index: usize, field: &'static str },

  /// Two targets would publish under the same asset name.
  #[error("duplicate artifact name `{artifact}` (targets #{first} and #{second})")]
  DuplicateArtifact {
    artifact: String,
    first: usize,
    second: usize,
  },

  /// A `requires` entry could not be parsed.
  #[error("target #{index}: invalid tool requirement `{requirement}`: {reason}")]
  InvalidRequirement {
    index: usize,
    requirement: String,
    reason: String,
  },

  /// The matrix defines no targets at all.
  #[error("matrix defines no targets")]
  Empty,
}

#[derive(Debug, Deserialize)]
struct MatrixDoc {
  #[serde(default, rename = "target")]
  targets: Vec<RawTarget>,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
  os: Option<Os>,
  arch: Option<Arch>,
  artifact: Option<String>,
  script: Option<String>,
  #[serde(default)]
  args: Vec<String>,
  cwd: Option<PathBuf>,
  artifact_dir: Option<PathBuf>,
  #[serde(default)]
  requires: Vec<String>,
}

/// Load and validate the build matrix from a TOML file.
pub fn load_matrix(path: &Path) -> Result<Vec<TargetDescriptor>, ConfigError> {
  let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  let matrix = parse_matrix(&text)?;
  debug!(path = %path.display(), targets = matrix.len(), "matrix loaded");
  Ok(matrix)
}

/// Parse and validate a matrix from TOML text.
///
/// Validation order: per-target mandatory fields and requirement syntax
/// first, then the artifact-name uniqueness invariant across targets.
pub fn parse_matrix(text: &str) -> Result<Vec<TargetDescriptor>, ConfigError> {
  let doc: MatrixDoc = toml::from_str(text)?;
  if doc.targets.is_empty() {
    return Err(ConfigError::Empty);
  }

  let mut targets = Vec::with_capacity(doc.targets.len());
  for (index, raw) in doc.targets.into_iter().enumerate() {
    targets.push(validate_target(index, raw)?);
  }

  // Two targets must never collide on the same published asset name.
  let mut seen: HashMap<String, usize> = HashMap::new();
  for (index, target) in targets.iter().enumerate() {
    if let Some(&first) = seen.get(&target.artifact) {
      return Err(ConfigError::DuplicateArtifact {
        artifact: target.artifact.clone(),
        first,
        second: index,
      });
    }
    seen.insert(target.artifact.clone(), index);
  }

  Ok(targets)
}

fn validate_target(index: usize, raw: RawTarget) -> Result<TargetDescriptor, ConfigError> {
  let os = raw.os.ok_or(ConfigError::MissingField { index, field: "os" })?;
  let artifact = raw
    .artifact
    .filter(|a| !a.trim().is_empty())
    .ok_or(ConfigError::MissingField { index, field: "artifact" })?;
  let script = raw
    .script
    .filter(|s| !s.trim().is_empty())
    .ok_or(ConfigError::MissingField { index, field: "script" })?;

  let mut requires = Vec::with_capacity(raw.requires.len());
  for requirement in raw.requires {
    let parsed = requirement
      .parse::<ToolRequirement>()
      .map_err(|reason| ConfigError::InvalidRequirement {
        index,
        requirement: requirement.clone(),
        reason,
      })?;
    requires.push(parsed);
  }

  Ok(TargetDescriptor {
    os,
    arch: raw.arch,
    artifact,
    script,
    args: raw.args,
    cwd: raw.cwd,
    artifact_dir: raw.artifact_dir,
    requires,
  })
}
