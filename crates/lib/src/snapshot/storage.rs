//! Reading and writing build-state snapshots.
//!
//! A snapshot is one JSON file. Writes go to `<file>.tmp` first and are then
//! renamed over the target, so a crash never leaves a truncated snapshot.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::consts::SNAPSHOT_VERSION;
use crate::node::BuildRoots;

use super::types::{BuildStateSnapshot, SnapshotError};

fn temp_path(path: &Path) -> PathBuf {
  let mut name = path.as_os_str().to_owned();
  name.push(".tmp");
  PathBuf::from(name)
}

/// Atomically write `snapshot` to `path`.
pub fn save(path: &Path, snapshot: &BuildStateSnapshot) -> Result<(), SnapshotError> {
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    fs::create_dir_all(parent).map_err(SnapshotError::CreateDir)?;
  }

  let temp = temp_path(path);
  let content = serde_json::to_string_pretty(snapshot).map_err(SnapshotError::Serialize)?;
  fs::write(&temp, &content).map_err(SnapshotError::Write)?;
  fs::rename(&temp, path).map_err(SnapshotError::Write)?;

  debug!(path = ?path, "saved build-state snapshot");
  Ok(())
}

/// Load a snapshot exactly as it was written.
pub fn load(path: &Path) -> Result<BuildStateSnapshot, SnapshotError> {
  let content = fs::read_to_string(path).map_err(SnapshotError::Read)?;
  let snapshot: BuildStateSnapshot = serde_json::from_str(&content).map_err(SnapshotError::Parse)?;
  if snapshot.version != SNAPSHOT_VERSION {
    return Err(SnapshotError::UnsupportedVersion(snapshot.version));
  }
  Ok(snapshot)
}

/// Load a snapshot and move it to the current roots.
///
/// Any load failure means "no prior state": it is logged and `None` is
/// returned so the build proceeds as if from a clean tree.
pub fn load_rebased(path: &Path, roots: &BuildRoots) -> Option<BuildStateSnapshot> {
  let snapshot = match load(path) {
    Ok(snapshot) => snapshot,
    Err(SnapshotError::Read(e)) if e.kind() == io::ErrorKind::NotFound => {
      debug!(path = ?path, "no previous build-state snapshot");
      return None;
    }
    Err(e) => {
      warn!(path = ?path, error = %e, "ignoring unusable build-state snapshot");
      return None;
    }
  };

  let engine_root = roots.engine.to_string_lossy();
  let third_party_root = roots.third_party.to_string_lossy();
  if snapshot.engine_root == engine_root && snapshot.third_party_root == third_party_root {
    return Some(snapshot);
  }

  info!(
    from = %snapshot.engine_root,
    to = %engine_root,
    "rebasing build-state snapshot to current roots"
  );
  Some(snapshot.rebased(&engine_root, &third_party_root))
}
