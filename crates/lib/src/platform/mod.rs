//! Host platform detection and filesystem backends.

pub mod fs;
pub mod os;

use os::Os;

/// Whether names on the local build tree's filesystem compare case-insensitively.
pub fn case_insensitive_fs() -> bool {
  Os::host().is_some_and(Os::case_insensitive_fs)
}

/// Longest inline command line for the host.
///
/// Unknown hosts get the most restrictive limit.
pub fn max_command_len() -> usize {
  Os::host().unwrap_or(Os::Windows).max_command_len()
}
