//! Build session and step execution.
//!
//! A [`BuildSession`] owns every service one build needs: the node resolver,
//! the signature calculator, the artifact store, the dependency scanner and
//! the metrics counters. Workers share it by reference; dropping it ends the
//! session. Each step goes through [`BuildSession::run_step`]:
//!
//! 1. Try the artifact cache
//! 2. On a miss, compile through the scanner, recording dependency edges
//! 3. Publish the outputs to the cache, unless the step was cancelled

mod types;

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::cache::{ArtifactStore, CacheMetrics, MetricsSummary};
use crate::config::CacheConfig;
use crate::node::{BuildRoots, NodeResolver};
use crate::platform::fs::FsOps;
use crate::scan::{CompileCommand, DependencyScanner, ScanError, ScannerConfig};
use crate::signature::SignatureCalculator;
use crate::step::BuildStep;

pub use types::{StepJob, StepOutcome, StepResult};

pub struct BuildSession {
  roots: BuildRoots,
  resolver: Arc<NodeResolver>,
  calculator: Arc<SignatureCalculator>,
  metrics: Arc<CacheMetrics>,
  store: ArtifactStore,
  scanner: DependencyScanner,
}

impl BuildSession {
  pub fn new(roots: BuildRoots, config: CacheConfig, scanner_config: ScannerConfig) -> Self {
    let resolver = Arc::new(NodeResolver::new(roots.clone(), scanner_config.case_insensitive));
    let calculator = Arc::new(SignatureCalculator::new(roots.clone()));
    let metrics = Arc::new(CacheMetrics::new());
    let store = ArtifactStore::new(config, Arc::clone(&calculator), Arc::clone(&metrics));
    let scanner = DependencyScanner::new(Arc::clone(&resolver), scanner_config);

    debug!(
      engine = ?roots.engine,
      output = ?roots.output,
      cache = ?store.config().cache_root,
      "build session started"
    );

    Self {
      roots,
      resolver,
      calculator,
      metrics,
      store,
      scanner,
    }
  }

  /// Use a different filesystem backend for the artifact store.
  pub fn with_fs(mut self, fs: Arc<dyn FsOps>) -> Self {
    self.store = self.store.with_fs(fs);
    self
  }

  pub fn roots(&self) -> &BuildRoots {
    &self.roots
  }

  pub fn resolver(&self) -> &NodeResolver {
    &self.resolver
  }

  pub fn calculator(&self) -> &SignatureCalculator {
    &self.calculator
  }

  pub fn store(&self) -> &ArtifactStore {
    &self.store
  }

  pub fn scanner(&self) -> &DependencyScanner {
    &self.scanner
  }

  /// Produce `step`'s outputs, from the cache if possible.
  pub async fn run_step(
    &self,
    step: &BuildStep,
    command: &CompileCommand,
    cancel: &CancellationToken,
  ) -> Result<StepOutcome, ScanError> {
    if cancel.is_cancelled() {
      return Err(ScanError::Cancelled {
        step: step.name().to_string(),
      });
    }
    if self.store.try_retrieve(step) {
      return Ok(StepOutcome::Retrieved);
    }

    let report = self.scanner.scan_and_compile(step, command, cancel).await?;
    if cancel.is_cancelled() {
      debug!(step = %step.name(), "cancelled after compile, not caching");
      return Ok(StepOutcome::Compiled(report));
    }

    // Outputs carry the signature of the step that produced them, the same
    // value a cache retrieval would give them.
    match self.calculator.sig(step) {
      Ok(sig) => {
        for node in step.outputs() {
          node.set_signature(Some(sig.clone()));
        }
        self.store.store(step);
      }
      Err(e) => debug!(step = %step.name(), error = %e, "no signature, not caching"),
    }
    Ok(StepOutcome::Compiled(report))
  }

  /// Current counter values.
  pub fn metrics(&self) -> MetricsSummary {
    self.metrics.summary(self.store.config().days_to_keep)
  }

  /// End the session and report cache effectiveness.
  pub fn finish(&self) -> MetricsSummary {
    let summary = self.metrics();
    info!(
      processed = summary.processed,
      missed = summary.missed,
      failed_retrieval = summary.failed_retrieval,
      hits = summary.hits(),
      stored = summary.stored,
      "artifact cache summary"
    );
    summary
  }
}

/// Run independent steps on a bounded worker pool.
///
/// At most `parallelism` steps run at once. Results are returned in job
/// order, one per job; a step whose worker panicked reports
/// [`ScanError::Aborted`]. Cancelling `cancel` stops running compiles and
/// fails the steps that have not started.
pub async fn execute_steps(
  session: Arc<BuildSession>,
  jobs: Vec<StepJob>,
  parallelism: usize,
  cancel: CancellationToken,
) -> Vec<StepResult> {
  info!(step_count = jobs.len(), parallelism, "executing steps");

  let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
  let mut join_set = JoinSet::new();
  let names: Vec<String> = jobs.iter().map(|job| job.step.name().to_string()).collect();

  for (index, job) in jobs.into_iter().enumerate() {
    let session = Arc::clone(&session);
    let semaphore = Arc::clone(&semaphore);
    let cancel = cancel.clone();
    join_set.spawn(async move {
      let name = job.step.name().to_string();
      let result = match semaphore.acquire().await {
        Ok(_permit) => session.run_step(&job.step, &job.command, &cancel).await,
        Err(_) => Err(ScanError::Cancelled { step: name.clone() }),
      };
      (index, StepResult { step: name, result })
    });
  }

  let mut results: Vec<Option<StepResult>> = names.iter().map(|_| None).collect();
  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok((index, result)) => results[index] = Some(result),
      Err(e) => error!(error = %e, "step task panicked"),
    }
  }

  // A panicked task leaves its slot empty.
  results
    .into_iter()
    .zip(names)
    .map(|(result, step)| {
      result.unwrap_or_else(|| StepResult {
        result: Err(ScanError::Aborted { step: step.clone() }),
        step,
      })
    })
    .collect()
}
