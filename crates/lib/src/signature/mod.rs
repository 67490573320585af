//! Step identity (`uid`) and content signature (`sig`).
//!
//! Both digests are computed from root-relative data only: node paths are
//! hashed in their `@ROOT@/rel` form and every absolute root occurring in an
//! environment value is replaced by its placeholder. Two checkouts of the
//! same tree at different locations therefore produce the same pair.
//!
//! - `uid` covers the step kind plus its input and output paths (case-folded).
//! - `sig` covers the step's environment variables (search-path lists
//!   excluded), the content of every input and the content of every
//!   discovered dependency.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;
use tracing::trace;

use crate::consts::SEARCH_PATH_VARS;
use crate::node::{BuildRoots, Node};
use crate::step::{BuildEnv, BuildStep, EnvId};
use crate::util::hash::{Digest, DigestBuilder, HashFileError, hash_file};

#[derive(Debug, Error)]
pub enum SignatureError {
  /// An input or dependency could not be read.
  #[error(transparent)]
  Hash(#[from] HashFileError),
}

/// The cache key of a step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepIdentity {
  pub uid: Digest,
  pub sig: Digest,
}

impl StepIdentity {
  /// Cache entry directory name: `uid` hex followed by `sig` hex.
  pub fn ssig(&self) -> String {
    format!("{}{}", self.uid, self.sig)
  }
}

/// Computes and memoizes step identities for one build session.
pub struct SignatureCalculator {
  roots: BuildRoots,
  env_memo: Mutex<HashMap<(EnvId, Vec<String>), Digest>>,
}

impl SignatureCalculator {
  pub fn new(roots: BuildRoots) -> Self {
    Self {
      roots,
      env_memo: Mutex::new(HashMap::new()),
    }
  }

  pub fn roots(&self) -> &BuildRoots {
    &self.roots
  }

  /// Path-based identity of `step`, memoized on the step.
  pub fn uid(&self, step: &BuildStep) -> Digest {
    step
      .uid_cell()
      .get_or_init(|| {
        let mut builder = DigestBuilder::new();
        builder.field(step.kind());
        builder.field("inputs");
        for node in step.inputs() {
          builder.field(&node.normalized());
        }
        builder.field("outputs");
        for node in step.outputs() {
          builder.field(&node.normalized());
        }
        builder.finish()
      })
      .clone()
  }

  /// Content signature of `step`, memoized until its dependencies change.
  pub fn sig(&self, step: &BuildStep) -> Result<Digest, SignatureError> {
    if let Some(sig) = step.cached_sig() {
      return Ok(sig);
    }

    let mut builder = DigestBuilder::new();
    builder.digest(&self.env_signature(step.env(), step.env_vars()));
    builder.field("inputs");
    for node in step.inputs() {
      builder.digest(&self.node_signature(node)?);
    }
    builder.field("dependencies");
    for node in step.dependencies().unwrap_or_default() {
      builder.field(&node.normalized());
      builder.digest(&self.node_signature(&node)?);
    }
    let sig = builder.finish();
    trace!(step = %step.name(), sig = %sig, "computed step signature");
    step.cache_sig(sig.clone());
    Ok(sig)
  }

  pub fn identity(&self, step: &BuildStep) -> Result<StepIdentity, SignatureError> {
    Ok(StepIdentity {
      uid: self.uid(step),
      sig: self.sig(step)?,
    })
  }

  /// Digest over the root-stripped values of `vars` in `env`.
  ///
  /// Memoized on `(env id, vars)`; search-path variables never contribute.
  pub fn env_signature(&self, env: &BuildEnv, vars: &[String]) -> Digest {
    let key = (env.id(), vars.to_vec());
    let mut memo = self.env_memo.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(digest) = memo.get(&key) {
      return digest.clone();
    }

    let mut builder = DigestBuilder::new();
    for var in vars.iter().filter(|v| !SEARCH_PATH_VARS.contains(&v.as_str())) {
      builder.field(var);
      let values = env.get(var).unwrap_or_default();
      builder.field(&values.len().to_string());
      for value in values {
        builder.field(&self.roots.strip_roots(value));
      }
    }
    let digest = builder.finish();
    memo.insert(key, digest.clone());
    digest
  }

  /// Content digest of a node, cached on the node itself.
  pub fn node_signature(&self, node: &Node) -> Result<Digest, HashFileError> {
    if let Some(sig) = node.signature() {
      return Ok(sig);
    }
    let sig = hash_file(&node.abs_path(&self.roots))?;
    node.set_signature(Some(sig.clone()));
    Ok(sig)
  }
}
