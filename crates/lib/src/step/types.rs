use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use serde::{Deserialize, Serialize};

use super::env::BuildEnv;
use crate::node::Node;
use crate::util::hash::Digest;

/// Progress of a step through the dependency scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
  /// Never executed in this session; dependency edges are unknown.
  #[default]
  NotRun,
  Running,
  Succeeded,
  Failed,
}

/// Human-facing labels used when reporting a failed step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepLabels {
  pub module: String,
  pub target: String,
  pub configuration: String,
}

#[derive(Debug, Default)]
struct Dynamic {
  state: ScanState,
  /// `None` until a scan succeeds or edges are restored from a snapshot.
  dependencies: Option<Vec<Node>>,
  sig: Option<Digest>,
}

/// One unit of work, typically one translation unit compiled to one object.
///
/// Inputs, outputs and the environment are fixed at construction. The scan
/// state, dependency edges and memoized `sig` change as the step runs.
#[derive(Debug)]
pub struct BuildStep {
  name: String,
  kind: String,
  labels: StepLabels,
  inputs: Vec<Node>,
  outputs: Vec<Node>,
  env: Arc<BuildEnv>,
  env_vars: Vec<String>,
  cwd: Option<PathBuf>,
  uid: OnceLock<Digest>,
  dynamic: Mutex<Dynamic>,
}

impl BuildStep {
  pub fn builder(name: impl Into<String>, kind: impl Into<String>) -> BuildStepBuilder {
    BuildStepBuilder {
      name: name.into(),
      kind: kind.into(),
      labels: StepLabels::default(),
      inputs: Vec::new(),
      outputs: Vec::new(),
      env: None,
      env_vars: Vec::new(),
      cwd: None,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn kind(&self) -> &str {
    &self.kind
  }

  pub fn labels(&self) -> &StepLabels {
    &self.labels
  }

  pub fn inputs(&self) -> &[Node] {
    &self.inputs
  }

  pub fn outputs(&self) -> &[Node] {
    &self.outputs
  }

  pub fn env(&self) -> &Arc<BuildEnv> {
    &self.env
  }

  /// Names of the variables that participate in `sig`.
  pub fn env_vars(&self) -> &[String] {
    &self.env_vars
  }

  /// Directory the compiler runs in, if different from the output root.
  pub fn cwd(&self) -> Option<&Path> {
    self.cwd.as_deref()
  }

  pub fn state(&self) -> ScanState {
    self.lock().state
  }

  pub fn set_state(&self, state: ScanState) {
    self.lock().state = state;
  }

  /// Discovered dependency edges, or `None` if they are not known yet.
  pub fn dependencies(&self) -> Option<Vec<Node>> {
    self.lock().dependencies.clone()
  }

  pub fn has_known_dependencies(&self) -> bool {
    self.lock().dependencies.is_some()
  }

  /// Replace the dependency edges. Invalidates the memoized `sig`.
  pub fn set_dependencies(&self, dependencies: Vec<Node>) {
    let mut dynamic = self.lock();
    dynamic.dependencies = Some(dependencies);
    dynamic.sig = None;
  }

  pub(crate) fn uid_cell(&self) -> &OnceLock<Digest> {
    &self.uid
  }

  pub(crate) fn cached_sig(&self) -> Option<Digest> {
    self.lock().sig.clone()
  }

  pub(crate) fn cache_sig(&self, sig: Digest) {
    self.lock().sig = Some(sig);
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Dynamic> {
    self.dynamic.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl fmt::Display for BuildStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.name, self.kind)
  }
}

pub struct BuildStepBuilder {
  name: String,
  kind: String,
  labels: StepLabels,
  inputs: Vec<Node>,
  outputs: Vec<Node>,
  env: Option<Arc<BuildEnv>>,
  env_vars: Vec<String>,
  cwd: Option<PathBuf>,
}

impl BuildStepBuilder {
  pub fn input(mut self, node: Node) -> Self {
    self.inputs.push(node);
    self
  }

  pub fn output(mut self, node: Node) -> Self {
    self.outputs.push(node);
    self
  }

  pub fn env(mut self, env: Arc<BuildEnv>) -> Self {
    self.env = Some(env);
    self
  }

  pub fn env_vars<I>(mut self, vars: I) -> Self
  where
    I: IntoIterator,
    I::Item: Into<String>,
  {
    self.env_vars = vars.into_iter().map(Into::into).collect();
    self
  }

  pub fn labels(mut self, module: impl Into<String>, target: impl Into<String>, configuration: impl Into<String>) -> Self {
    self.labels = StepLabels {
      module: module.into(),
      target: target.into(),
      configuration: configuration.into(),
    };
    self
  }

  pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }

  pub fn build(self) -> BuildStep {
    BuildStep {
      name: self.name,
      kind: self.kind,
      labels: self.labels,
      inputs: self.inputs,
      outputs: self.outputs,
      env: self.env.unwrap_or_else(|| Arc::new(BuildEnv::empty())),
      env_vars: self.env_vars,
      cwd: self.cwd,
      uid: OnceLock::new(),
      dynamic: Mutex::new(Dynamic::default()),
    }
  }
}
