//! Persisting discovered dependency edges between builds.
//!
//! Edges live in the snapshot's `deps` map, keyed by step `uid`, as lists of
//! node references. Recorded signatures are informational: on restore every
//! edge is re-resolved against the live tree and hashed afresh.

use std::path::Path;

use tracing::debug;

use crate::execute::BuildSession;
use crate::node::Node;
use crate::step::BuildStep;

use super::types::{BuildStateSnapshot, SnapshotValue};

/// Key of the per-step dependency map in the snapshot state.
pub const DEPS_KEY: &str = "deps";

/// Write the known dependency edges of `steps` into `snapshot`.
///
/// Steps whose edges are unknown are left out. Returns the number of steps
/// recorded.
pub fn record_dependencies<'a, I>(snapshot: &mut BuildStateSnapshot, session: &BuildSession, steps: I) -> usize
where
  I: IntoIterator<Item = &'a BuildStep>,
{
  let roots = session.roots();
  let mut deps = match snapshot.state.get(DEPS_KEY) {
    Some(existing @ SnapshotValue::Map(_)) => existing.clone(),
    _ => SnapshotValue::map(),
  };

  let mut recorded = 0;
  for step in steps {
    let Some(edges) = step.dependencies() else {
      continue;
    };
    let nodes = edges
      .iter()
      .map(|node| SnapshotValue::Node {
        path: node.abs_path(roots).to_string_lossy().into_owned(),
        sig: node.signature(),
      })
      .collect();
    deps.insert(session.calculator().uid(step).to_string(), SnapshotValue::Seq(nodes));
    recorded += 1;
  }

  snapshot.state.insert(DEPS_KEY, deps);
  recorded
}

/// Reinstall recorded edges on steps that have not run in this session.
///
/// A step whose recorded edges no longer resolve (a header was deleted or
/// moved out of the tree) is left with unknown edges so it compiles again.
/// Returns the number of steps restored.
pub fn restore_dependencies<'a, I>(snapshot: &BuildStateSnapshot, session: &BuildSession, steps: I) -> usize
where
  I: IntoIterator<Item = &'a BuildStep>,
{
  let Some(deps) = snapshot.state.get(DEPS_KEY) else {
    return 0;
  };

  let mut restored = 0;
  for step in steps {
    if step.has_known_dependencies() {
      continue;
    }
    let uid = session.calculator().uid(step);
    let Some(recorded) = deps.get(uid.as_str()).and_then(SnapshotValue::as_seq) else {
      continue;
    };
    match resolve_recorded(session, recorded) {
      Some(nodes) => {
        step.set_dependencies(nodes);
        restored += 1;
      }
      None => debug!(step = %step.name(), "recorded dependencies are stale"),
    }
  }
  restored
}

fn resolve_recorded(session: &BuildSession, recorded: &[SnapshotValue]) -> Option<Vec<Node>> {
  recorded
    .iter()
    .map(|value| match value {
      SnapshotValue::Node { path, .. } => session.resolver().resolve_abs(Path::new(path)).ok(),
      _ => None,
    })
    .collect()
}
