//! Rebase command implementation.
//!
//! Moves a build-state snapshot written in one checkout to another checkout's
//! roots, in place.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use stepcache_lib::snapshot;

use crate::output::{OutputFormat, print_info, print_json, print_stat, print_success, symbols};

#[derive(Serialize)]
struct RebaseReport {
  snapshot: PathBuf,
  old_engine_root: String,
  old_third_party_root: String,
  engine_root: String,
  third_party_root: String,
  changed: bool,
}

/// Canonical form of a root that exists, the given path otherwise.
fn root_string(path: &Path) -> String {
  let path = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
  path.to_string_lossy().into_owned()
}

pub fn cmd_rebase(path: &Path, engine_root: &Path, third_party_root: &Path, output: OutputFormat) -> Result<()> {
  let loaded = snapshot::load(path).with_context(|| format!("Failed to load snapshot {}", path.display()))?;
  let engine_root = root_string(engine_root);
  let third_party_root = root_string(third_party_root);

  let rebased = loaded.rebased(&engine_root, &third_party_root);
  let changed = rebased != loaded;
  debug!(snapshot = ?path, changed, "rebased snapshot");
  if changed {
    snapshot::save(path, &rebased).with_context(|| format!("Failed to write snapshot {}", path.display()))?;
  }

  let report = RebaseReport {
    snapshot: path.to_path_buf(),
    old_engine_root: loaded.engine_root,
    old_third_party_root: loaded.third_party_root,
    engine_root,
    third_party_root,
    changed,
  };

  if output.is_json() {
    return print_json(&report);
  }

  if !changed {
    print_info(&format!("{} already uses these roots", report.snapshot.display()));
    return Ok(());
  }
  print_success(&format!("Rebased {}", report.snapshot.display()));
  print_stat(
    "Engine",
    &format!("{} {} {}", report.old_engine_root, symbols::ARROW, report.engine_root),
  );
  print_stat(
    "Third-party",
    &format!(
      "{} {} {}",
      report.old_third_party_root,
      symbols::ARROW,
      report.third_party_root
    ),
  );

  Ok(())
}
