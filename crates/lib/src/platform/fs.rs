//! Filesystem operations used by the artifact store.
//!
//! The store talks to the filesystem only through [`FsOps`], so its logic
//! never branches on the host OS. [`NativeFs`] is the real backend; the OS
//! specific parts live in the per-platform sections at the bottom.
//!
//! ## Platform Behavior
//!
//! - **Unix**: entries get mode 0755 (dirs) / 0644 (files); paths are used as-is
//! - **Windows**: read-only attributes are cleared; long absolute paths are
//!   converted to the `\\?\` extended-length form

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use filetime::FileTime;

/// Windows `MAX_PATH` minus the terminating NUL.
pub const WINDOWS_MAX_PATH: usize = 259;

/// Platform-neutral file operations.
pub trait FsOps: Send + Sync {
  /// Copy file contents from `from` to `to`, replacing `to`.
  fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64>;

  /// Rename `from` to `to` in a single OS call.
  fn atomic_rename(&self, from: &Path, to: &Path) -> io::Result<()>;

  /// Give a cache entry (or a file inside it) fixed, permissive permissions.
  fn set_permissive(&self, path: &Path) -> io::Result<()>;

  /// Create `path` and any missing parents.
  fn create_dir_all(&self, path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(self.os_path(path))
  }

  /// Create `path`, failing with `AlreadyExists` if something is there.
  fn create_dir(&self, path: &Path) -> io::Result<()> {
    std::fs::create_dir(self.os_path(path))
  }

  /// Remove a directory and everything below it.
  fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
    std::fs::remove_dir_all(self.os_path(path))
  }

  /// Last modification time of `path`.
  fn modified(&self, path: &Path) -> io::Result<SystemTime> {
    std::fs::metadata(self.os_path(path))?.modified()
  }

  /// Set the modification time of `path` to now.
  fn touch(&self, path: &Path) -> io::Result<()> {
    filetime::set_file_mtime(self.os_path(path), FileTime::now())
  }

  /// Convert a path to the form the OS needs for it to be usable regardless
  /// of its length.
  fn os_path(&self, path: &Path) -> PathBuf {
    path.to_path_buf()
  }
}

/// The host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFs;

impl FsOps for NativeFs {
  fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
    std::fs::copy(self.os_path(from), self.os_path(to))
  }

  fn atomic_rename(&self, from: &Path, to: &Path) -> io::Result<()> {
    std::fs::rename(self.os_path(from), self.os_path(to))
  }

  fn set_permissive(&self, path: &Path) -> io::Result<()> {
    set_permissive_impl(&self.os_path(path))
  }

  fn os_path(&self, path: &Path) -> PathBuf {
    extended_length_path(path)
  }
}

/// Rewrite an absolute Windows path longer than `MAX_PATH` into its
/// extended-length form (`\\?\C:\...` or `\\?\UNC\server\share\...`).
///
/// Shorter, relative, or already-extended paths are returned unchanged.
/// Forward slashes are converted since extended-length paths are not
/// normalized by the OS.
pub fn windows_extended_length(path: &str) -> String {
  if path.len() <= WINDOWS_MAX_PATH || path.starts_with(r"\\?\") {
    return path.to_string();
  }
  let path = path.replace('/', "\\");
  if let Some(unc) = path.strip_prefix(r"\\") {
    return format!(r"\\?\UNC\{}", unc);
  }
  let bytes = path.as_bytes();
  if bytes.len() > 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'\\' {
    return format!(r"\\?\{}", path);
  }
  path
}

// ============ Unix Implementation ============

#[cfg(not(windows))]
pub fn extended_length_path(path: &Path) -> PathBuf {
  path.to_path_buf()
}

#[cfg(unix)]
fn set_permissive_impl(path: &Path) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt;

  let metadata = std::fs::metadata(path)?;
  let mode = if metadata.is_dir() { 0o755 } else { 0o644 };
  let mut perms = metadata.permissions();
  perms.set_mode(mode);
  std::fs::set_permissions(path, perms)
}

// ============ Windows Implementation ============

#[cfg(windows)]
pub fn extended_length_path(path: &Path) -> PathBuf {
  PathBuf::from(windows_extended_length(&path.to_string_lossy()))
}

#[cfg(windows)]
fn set_permissive_impl(path: &Path) -> io::Result<()> {
  let mut perms = std::fs::metadata(path)?.permissions();
  #[allow(clippy::permissions_set_readonly_false)]
  perms.set_readonly(false);
  std::fs::set_permissions(path, perms)
}
