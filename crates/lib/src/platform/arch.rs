use std::fmt;

use serde::{Deserialize, Serialize};

/// CPU architecture variants a build target can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
  X64,
  Arm64,
  X86,
}

impl Arch {
  /// Detect the CPU architecture this process runs on.
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86_64" => Some(Self::X64),
      "aarch64" => Some(Self::Arm64),
      "x86" => Some(Self::X86),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this architecture.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X64 => "x64",
      Self::Arm64 => "arm64",
      Self::X86 => "x86",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn current_returns_supported_arch() {
    assert!(Arch::current().is_some(), "current arch should be supported");
  }
}
