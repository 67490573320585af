//! Shared, content-addressed artifact cache.
//!
//! # Layout
//!
//! ```text
//! {cache_root}/
//! ├── <uid><sig>/          # one entry per step key
//! │   ├── a.obj            # one file per output, named by its base name
//! │   └── a.pdb
//! └── <uid><sig>.tmp/      # entry being assembled by some writer
//! ```
//!
//! There is no index: the presence of the entry directory is the index.
//! Entries only ever appear through a rename of their fully populated
//! `.tmp` sibling, so readers never see a partial entry. The directory
//! modification time marks last use for the external age-based sweep.

mod metrics;
mod types;

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::CacheConfig;
use crate::consts::CACHE_TMP_SUFFIX;
use crate::platform::fs::{FsOps, NativeFs};
use crate::signature::{SignatureCalculator, StepIdentity};
use crate::step::BuildStep;

pub use metrics::{CacheMetrics, MetricsSummary};
pub use types::{CacheEntry, CacheError, RetrieveOutcome, SkipReason, StoreOutcome};

pub struct ArtifactStore {
  config: CacheConfig,
  calculator: Arc<SignatureCalculator>,
  metrics: Arc<CacheMetrics>,
  fs: Arc<dyn FsOps>,
}

impl ArtifactStore {
  pub fn new(config: CacheConfig, calculator: Arc<SignatureCalculator>, metrics: Arc<CacheMetrics>) -> Self {
    Self {
      config,
      calculator,
      metrics,
      fs: Arc::new(NativeFs),
    }
  }

  /// Use a different filesystem backend.
  pub fn with_fs(mut self, fs: Arc<dyn FsOps>) -> Self {
    self.fs = fs;
    self
  }

  pub fn config(&self) -> &CacheConfig {
    &self.config
  }

  /// Directory an entry for `identity` lives in, if a cache root is set.
  pub fn entry_dir(&self, identity: &StepIdentity) -> Option<PathBuf> {
    self.config.cache_root.as_ref().map(|root| root.join(identity.ssig()))
  }

  /// Copy the step's outputs out of the cache. Returns `true` on a hit.
  pub fn try_retrieve(&self, step: &BuildStep) -> bool {
    self.retrieve(step).is_hit()
  }

  pub fn retrieve(&self, step: &BuildStep) -> RetrieveOutcome {
    let Some(root) = self.config.cache_root.as_deref().filter(|_| self.config.restore) else {
      return RetrieveOutcome::Disabled;
    };
    self.metrics.record_processed();

    if !step.has_known_dependencies() {
      debug!(step = %step.name(), "dependencies unknown, not using cache");
      self.metrics.record_miss();
      return RetrieveOutcome::Ineligible;
    }

    let identity = match self.calculator.identity(step) {
      Ok(identity) => identity,
      Err(e) => {
        debug!(step = %step.name(), error = %e, "no cache key");
        self.metrics.record_miss();
        return RetrieveOutcome::Miss;
      }
    };
    let dir = root.join(identity.ssig());

    // Check every file before touching the build tree, so a partial entry
    // never leaves a partial copy behind.
    let complete = self.fs.os_path(&dir).is_dir()
      && step
        .outputs()
        .iter()
        .all(|node| self.fs.os_path(&dir.join(node.name())).is_file());
    if !complete {
      debug!(step = %step.name(), ssig = %identity.ssig(), "cache miss");
      self.metrics.record_miss();
      return RetrieveOutcome::Miss;
    }

    // Outputs are overwritten from here on; their old signatures no longer
    // describe what is on disk until the copy completes.
    for node in step.outputs() {
      node.set_signature(None);
    }
    let roots = self.calculator.roots();
    for node in step.outputs() {
      let cached = dir.join(node.name());
      let dest = node.abs_path(roots);
      match self.copy_verified(&cached, &dest) {
        Ok(true) => {}
        Ok(false) => {
          warn!(step = %step.name(), path = ?cached, "cache entry changed during retrieval");
          self.metrics.record_failed_retrieval();
          return RetrieveOutcome::Raced;
        }
        Err(e) => {
          warn!(step = %step.name(), path = ?cached, error = %e, "cache retrieval failed");
          self.metrics.record_failed_retrieval();
          return RetrieveOutcome::Failed;
        }
      }
    }

    for node in step.outputs() {
      node.set_signature(Some(identity.sig.clone()));
    }
    if let Err(e) = self.fs.touch(&dir) {
      debug!(path = ?dir, error = %e, "failed to mark cache entry as used");
    }
    info!(step = %step.name(), ssig = %identity.ssig(), "retrieved from cache");
    RetrieveOutcome::Retrieved
  }

  /// Copy `cached` over `dest` and report whether the cache file kept the
  /// same modification time throughout.
  fn copy_verified(&self, cached: &Path, dest: &Path) -> io::Result<bool> {
    let before = self.fs.modified(cached)?;
    self.fs.copy_file(cached, dest)?;
    let after = self.fs.modified(cached)?;
    Ok(before == after)
  }

  /// Publish the step's outputs under its key.
  ///
  /// Never fails the build: problems are logged and returned as
  /// [`StoreOutcome::Failed`].
  pub fn store(&self, step: &BuildStep) -> StoreOutcome {
    let Some(root) = self.config.cache_root.as_deref().filter(|_| self.config.upload) else {
      return StoreOutcome::Skipped(SkipReason::Disabled);
    };
    if !step.has_known_dependencies() {
      return StoreOutcome::Skipped(SkipReason::Ineligible);
    }

    let mut names = HashSet::new();
    if !step.outputs().iter().all(|node| names.insert(node.name().to_string())) {
      warn!(step = %step.name(), "outputs share a base name, not caching");
      return StoreOutcome::Skipped(SkipReason::DuplicateOutputName);
    }

    let identity = match self.calculator.identity(step) {
      Ok(identity) => identity,
      Err(e) => return self.store_failed(step, CacheError::from(e)),
    };
    let ssig = identity.ssig();
    let dir = root.join(&ssig);
    let tmp = root.join(format!("{}{}", ssig, CACHE_TMP_SUFFIX));
    if self.fs.os_path(&dir).exists() || self.fs.os_path(&tmp).exists() {
      debug!(step = %step.name(), ssig = %ssig, "already cached");
      return StoreOutcome::Skipped(SkipReason::Exists);
    }

    if let Err(e) = self.fs.create_dir_all(root) {
      return self.store_failed(step, CacheError::io("create", root)(e));
    }
    match self.fs.create_dir(&tmp) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return StoreOutcome::Skipped(SkipReason::Exists),
      Err(e) => return self.store_failed(step, CacheError::io("create", &tmp)(e)),
    }

    if let Err(e) = self.populate(step, &tmp) {
      self.remove_tmp(&tmp);
      return self.store_failed(step, e);
    }

    if let Err(e) = self.fs.atomic_rename(&tmp, &dir) {
      self.remove_tmp(&tmp);
      if self.fs.os_path(&dir).exists() {
        debug!(step = %step.name(), ssig = %ssig, "another writer published first");
        return StoreOutcome::Skipped(SkipReason::Exists);
      }
      return self.store_failed(step, CacheError::io("rename", &tmp)(e));
    }

    self.metrics.record_stored();
    info!(step = %step.name(), ssig = %ssig, "stored in cache");
    StoreOutcome::Stored
  }

  fn populate(&self, step: &BuildStep, tmp: &Path) -> Result<(), CacheError> {
    let roots = self.calculator.roots();
    for node in step.outputs() {
      let src = node.abs_path(roots);
      let dest = tmp.join(node.name());
      self.fs.copy_file(&src, &dest).map_err(CacheError::io("copy", &src))?;
      self.fs.set_permissive(&dest).map_err(CacheError::io("set permissions on", &dest))?;
    }
    self.fs.set_permissive(tmp).map_err(CacheError::io("set permissions on", tmp))
  }

  fn remove_tmp(&self, tmp: &Path) {
    if let Err(e) = self.fs.remove_dir_all(tmp) {
      debug!(path = ?tmp, error = %e, "failed to remove temporary cache entry");
    }
  }

  fn store_failed(&self, step: &BuildStep, error: CacheError) -> StoreOutcome {
    warn!(step = %step.name(), error = %error, "failed to store in cache");
    StoreOutcome::Failed(error)
  }
}

/// List the published entries under `root`, skipping in-progress `.tmp`
/// directories. A missing root has no entries.
pub fn list_entries(root: &Path) -> Result<Vec<CacheEntry>, CacheError> {
  let read = match fs::read_dir(root) {
    Ok(read) => read,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(e) => return Err(CacheError::io("read", root)(e)),
  };

  let mut entries = Vec::new();
  for dirent in read {
    let dirent = dirent.map_err(CacheError::io("read", root))?;
    let ssig = dirent.file_name().to_string_lossy().into_owned();
    let path = dirent.path();
    if ssig.ends_with(CACHE_TMP_SUFFIX) || !path.is_dir() {
      continue;
    }
    let modified = dirent
      .metadata()
      .and_then(|m| m.modified())
      .map_err(CacheError::io("stat", &path))?;

    let mut files = 0;
    let mut size = 0;
    for file in WalkDir::new(&path).min_depth(1).into_iter().filter_map(Result::ok) {
      if file.file_type().is_file() {
        files += 1;
        size += file.metadata().map(|m| m.len()).unwrap_or(0);
      }
    }
    entries.push(CacheEntry {
      ssig,
      files,
      size,
      modified,
    });
  }
  entries.sort_by(|a, b| a.ssig.cmp(&b.ssig));
  Ok(entries)
}
