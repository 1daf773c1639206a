use std::path::Path;

use crate::platform::Os;

use super::probe;
use super::Provisioner;

/// Provisioner for macOS hosts. Installs missing tools through Homebrew.
pub struct MacOsProvisioner;

impl Provisioner for MacOsProvisioner {
  fn os(&self) -> Os {
    Os::MacOs
  }

  fn install_argv(&self, tool: &str) -> Option<Vec<String>> {
    let formula = match tool {
      // Apple ships clang with the command line tools; brew's llvm
      // provides a standalone copy when the system one is missing.
      "clang" => "llvm",
      "nasm" => "nasm",
      other => other,
    };
    Some(
      ["brew", "install", formula]
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
