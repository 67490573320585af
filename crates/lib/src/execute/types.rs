//! Types for running build steps through the cache and the scanner.

use std::sync::Arc;

use crate::scan::{CompileCommand, ScanError, ScanReport};
use crate::step::BuildStep;

/// How a step's outputs were produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
  /// Copied out of the artifact cache; the compiler did not run.
  Retrieved,
  /// Compiled, with dependency edges recorded.
  Compiled(ScanReport),
}

/// A step paired with the compiler command that builds it.
#[derive(Debug, Clone)]
pub struct StepJob {
  pub step: Arc<BuildStep>,
  pub command: CompileCommand,
}

impl StepJob {
  pub fn new(step: Arc<BuildStep>, command: CompileCommand) -> Self {
    Self { step, command }
  }
}

/// Result of one job from [`execute_steps`](super::execute_steps), in job
/// order.
#[derive(Debug)]
pub struct StepResult {
  pub step: String,
  pub result: Result<StepOutcome, ScanError>,
}

impl StepResult {
  pub fn is_ok(&self) -> bool {
    self.result.is_ok()
  }
}
