//! Tool probing: locate a tool on PATH and ask it for its version.

use std::path::{Path, PathBuf};

use semver::Version;
use tokio::process::Command;
use tracing::debug;

use crate::matrix::parse_loose_version;

/// What probing found for one tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
  /// Resolved binary path.
  pub path: PathBuf,

  /// Version reported by `<tool> --version`, when it could be parsed.
  pub version: Option<Version>,
}

/// Probe a tool by name: PATH lookup, then a `--version` query.
///
/// Returns `None` when the tool is not on PATH. A tool that is present but
/// will not report a parseable version yields `version: None`; the caller
/// decides whether that satisfies a constraint.
pub async fn probe_tool(tool: &str) -> Option<ToolInfo> {
  let path = find_in_path(tool)?;

  let version = match Command::new(&path).arg("--version").output().await {
    Ok(out) if out.status.success() => {
      let stdout = String::from_utf8_lossy(&out.stdout);
      parse_version_output(&stdout)
    }
    _ => None,
  };

  debug!(tool, path = %path.display(), version = ?version, "probed tool");
  Some(ToolInfo { path, version })
}

/// Search PATH for an executable with the given name.
pub fn find_in_path(tool: &str) -> Option<PathBuf> {
  let path_var = std::env::var_os("PATH")?;
  for dir in std::env::split_paths(&path_var) {
    let candidate = dir.join(tool);
    if candidate.is_file() {
      return Some(candidate);
    }
    #[cfg(windows)]
    {
      let exe = dir.join(format!("{tool}.exe"));
      if exe.is_file() {
        return Some(exe);
      }
    }
  }
  None
}

/// Extract a version from `--version` output.
///
/// Tools print banners like `clang version 14.0.6` or
/// `NASM version 2.15.05 compiled on ...`; the first token that starts with
/// a digit and parses as a (loose) semver wins.
pub fn parse_version_output(output: &str) -> Option<Version> {
  output
    .split_whitespace()
    .filter(|token| token.starts_with(|c: char| c.is_ascii_digit()))
    .find_map(parse_loose_version)
}

/// Derive the library directory belonging to an installed tool.
///
/// Convention: `<prefix>/bin/<tool>` has its libraries at `<prefix>/lib`.
/// Used to export locator variables like `LIBCLANG_PATH` for builds that
/// link against the toolchain.
pub fn resolve_library_path(tool_path: &Path) -> Option<PathBuf> {
  let prefix = tool_path.parent()?.parent()?;
  let lib = prefix.join("lib");
  lib.is_dir().then_some(lib)
}
