use std::path::Path;

use crate::platform::Os;

use super::probe;
use super::Provisioner;

/// Provisioner for Windows hosts. Installs missing tools through Chocolatey.
pub struct WindowsProvisioner;

impl Provisioner for WindowsProvisioner {
  fn os(&self) -> Os {
    Os::Windows
  }

  fn install_argv(&self, tool: &str) -> Option<Vec<String>> {
    let package = match tool {
      "clang" => "llvm",
      "nasm" => "nasm",
      other => other,
    };
    Some(
      ["choco", "install", "-y", package]
        .into_iter()
        .map(String::from)
        .collect(),
    )
  }

  fn derived_env(&self, tool: &str, tool_path: &Path) -> Vec<(String, String)> {
    match tool {
      "clang" => probe::resolve_library_path(tool_path)
        .map(|lib| vec![("LIBCLANG_PATH".to_string(), lib.display().to_string())])
        .unwrap_or_default(),
      _ => Vec::new(),
    }
  }
}
