use std::path::PathBuf;
use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;

use crate::signature::SignatureError;

#[derive(Debug, Error)]
pub enum CacheError {
  #[error("cannot compute cache key: {0}")]
  Identity(#[from] SignatureError),

  #[error("failed to {op} {}: {source}", path.display())]
  Io {
    op: &'static str,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl CacheError {
  pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
    let path = path.into();
    move |source| Self::Io { op, path, source }
  }
}

/// Result of asking the cache for a step's outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieveOutcome {
  /// Restoring is switched off or no cache root is configured.
  Disabled,
  /// The step's dependencies are unknown, so its key cannot be trusted.
  Ineligible,
  /// No complete entry for the step's key.
  Miss,
  /// Every output was copied into the build tree.
  Retrieved,
  /// The entry changed while it was being copied.
  Raced,
  /// Copying failed for another reason.
  Failed,
}

impl RetrieveOutcome {
  pub fn is_hit(&self) -> bool {
    matches!(self, Self::Retrieved)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  Disabled,
  Ineligible,
  /// The entry (or its temporary sibling) already exists.
  Exists,
  /// Two outputs share a base name and cannot live in one entry.
  DuplicateOutputName,
}

/// Result of writing a step's outputs to the cache.
///
/// Store failures never fail the build, so they are reported here instead of
/// as an `Err`.
#[derive(Debug)]
pub enum StoreOutcome {
  Stored,
  Skipped(SkipReason),
  Failed(CacheError),
}

/// An entry found on disk, for inspection tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
  pub ssig: String,
  pub files: usize,
  pub size: u64,
  pub modified: SystemTime,
}

impl CacheEntry {
  /// Whole days since the entry was last stored or retrieved.
  pub fn age_days(&self, now: SystemTime) -> u64 {
    now
      .duration_since(self.modified)
      .map(|d| d.as_secs() / 86_400)
      .unwrap_or(0)
  }
}
