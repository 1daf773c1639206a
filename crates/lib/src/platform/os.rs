use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Operating system variants a build target can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
  Linux,
  MacOs,
  Windows,
}

impl Os {
  /// Detect the operating system this process runs on.
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this OS.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "macos",
      Self::Windows => "windows",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Os {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "linux" => Ok(Self::Linux),
      "macos" => Ok(Self::MacOs),
      "windows" => Ok(Self::Windows),
      other => Err(format!("unknown os `{other}` (expected linux, macos or windows)")),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn current_returns_supported_os() {
    assert!(Os::current().is_some(), "current OS should be supported");
  }

  #[test]
  fn round_trips_through_str() {
    for os in [Os::Linux, Os::MacOs, Os::Windows] {
      assert_eq!(os.as_str().parse::<Os>(), Ok(os));
    }
  }

  #[test]
  fn rejects_unknown_os() {
    assert!("freebsd".parse::<Os>().is_err());
  }
}
