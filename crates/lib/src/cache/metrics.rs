//! Process-local cache effectiveness counters.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters shared by every worker of one build session.
#[derive(Debug, Default)]
pub struct CacheMetrics {
  processed: AtomicU64,
  missed: AtomicU64,
  failed_retrieval: AtomicU64,
  stored: AtomicU64,
}

impl CacheMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record_processed(&self) {
    self.processed.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_miss(&self) {
    self.missed.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_failed_retrieval(&self) {
    self.failed_retrieval.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_stored(&self) {
    self.stored.fetch_add(1, Ordering::Relaxed);
  }

  /// Snapshot the counters.
  pub fn summary(&self, days_to_keep: u32) -> MetricsSummary {
    MetricsSummary {
      processed: self.processed.load(Ordering::Relaxed),
      missed: self.missed.load(Ordering::Relaxed),
      failed_retrieval: self.failed_retrieval.load(Ordering::Relaxed),
      stored: self.stored.load(Ordering::Relaxed),
      days_to_keep,
    }
  }
}

/// Final counter values of one process.
///
/// Multi-process builds merge the summaries of each worker process at the
/// end of the build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSummary {
  pub processed: u64,
  pub missed: u64,
  pub failed_retrieval: u64,
  pub stored: u64,
  pub days_to_keep: u32,
}

impl MetricsSummary {
  /// Steps satisfied from the cache.
  pub fn hits(&self) -> u64 {
    self.processed.saturating_sub(self.missed + self.failed_retrieval)
  }

  pub fn merge(&mut self, other: &MetricsSummary) {
    self.processed += other.processed;
    self.missed += other.missed;
    self.failed_retrieval += other.failed_retrieval;
    self.stored += other.stored;
    self.days_to_keep = self.days_to_keep.max(other.days_to_keep);
  }

  /// Write one `name=value` line per counter.
  pub fn write_record<W: Write>(&self, mut out: W) -> io::Result<()> {
    writeln!(out, "artifacts_cache.processed={}", self.processed)?;
    writeln!(out, "artifacts_cache.missed={}", self.missed)?;
    writeln!(out, "artifacts_cache.failed_retrieval={}", self.failed_retrieval)?;
    writeln!(out, "artifacts_cache.hits={}", self.hits())?;
    writeln!(out, "artifacts_cache.stored={}", self.stored)?;
    writeln!(out, "artifacts_cache.days_to_keep={}", self.days_to_keep)?;
    Ok(())
  }
}
