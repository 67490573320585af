use std::fmt;

use serde::Serialize;

/// Host systems a build can run on, and the limits that differ between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
  Linux,
  MacOs,
  Windows,
}

impl Os {
  /// The system this binary was compiled for, if it is one we know.
  pub const fn host() -> Option<Self> {
    if cfg!(target_os = "windows") {
      Some(Self::Windows)
    } else if cfg!(target_os = "macos") {
      Some(Self::MacOs)
    } else if cfg!(target_os = "linux") {
      Some(Self::Linux)
    } else {
      None
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "macos",
      Self::Windows => "windows",
    }
  }

  /// NTFS and APFS compare file names without regard to case by default.
  pub fn case_insensitive_fs(self) -> bool {
    !matches!(self, Self::Linux)
  }

  /// Longest command line handed to a compiler before switching to a
  /// response file.
  ///
  /// 8191 is the `cmd.exe` limit. Unix allows far more, but a single
  /// argument is capped by `MAX_ARG_STRLEN` (128 KiB).
  pub fn max_command_len(self) -> usize {
    match self {
      Self::Windows => 8191,
      Self::Linux | Self::MacOs => 131_072,
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}
