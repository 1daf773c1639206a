//! Platform model: operating systems and CPU architectures a target can name.

mod arch;
mod os;

pub use arch::Arch;
pub use os::Os;

/// Returns true if the given target OS matches the host this process runs on.
///
/// Returns `false` on unrecognized hosts; the provisioner turns that into a
/// per-target error rather than guessing.
pub fn host_matches(os: Os) -> bool {
  Os::current() == Some(os)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn host_matches_current_os() {
    let host = Os::current().expect("test host should be a supported OS");
    assert!(host_matches(host));
  }

  #[test]
  fn host_rejects_other_os() {
    let host = Os::current().expect("test host should be a supported OS");
    let other = match host {
      Os::Linux => Os::Windows,
      Os::MacOs => Os::Linux,
      Os::Windows => Os::MacOs,
    };
    assert!(!host_matches(other));
  }
}
