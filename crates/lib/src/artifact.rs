//! Artifact location and validation.
//!
//! After a build exits zero, the declared artifact must exist at the
//! conventional path. A missing artifact after a successful build signals a
//! build-script/matrix mismatch rather than a compiler error, so callers
//! surface it as a distinct outcome. No content validation happens here.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::matrix::TargetDescriptor;

/// The path the descriptor's artifact is expected at: the working directory,
/// or its declared `artifact_dir` sub-path, joined with the artifact name.
pub fn expected_path(descriptor: &TargetDescriptor, working_directory: &Path) -> PathBuf {
  let dir = match &descriptor.artifact_dir {
    Some(sub) => working_directory.join(sub),
    None => working_directory.to_path_buf(),
  };
  dir.join(&descriptor.artifact)
}

/// Confirm the artifact exists, returning its path.
///
/// Returns `None` when the file is absent (or is not a regular file); the
/// caller maps that to the `ArtifactMissing` outcome.
pub fn locate(descriptor: &TargetDescriptor, working_directory: &Path) -> Option<PathBuf> {
  let path = expected_path(descriptor, working_directory);
  if path.is_file() {
    debug!(target = %descriptor.artifact, path = %path.display(), "artifact located");
    Some(path)
  } else {
    debug!(target = %descriptor.artifact, path = %path.display(), "artifact absent");
    None
  }
}
