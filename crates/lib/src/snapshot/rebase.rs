//! Moving a snapshot from the roots it was written under to the current ones.
//!
//! Node references are re-anchored by prefix and keep their recorded content
//! signature. Plain strings get every embedded root rewritten, since they
//! carry things like cached command-line fragments.

use std::collections::BTreeMap;

use crate::util::path::{replace_roots, starts_with_root};

use super::types::{BuildStateSnapshot, SnapshotValue};

/// Rebase `value` from the old engine/third-party roots to the new ones.
///
/// Values under neither old root are returned unchanged. Rebasing a value
/// that is already under the new roots is a no-op.
pub fn rebase(
  value: &SnapshotValue,
  old_engine_root: &str,
  old_third_party_root: &str,
  new_engine_root: &str,
  new_third_party_root: &str,
) -> SnapshotValue {
  let mut pairs = vec![
    (old_engine_root, new_engine_root),
    (old_third_party_root, new_third_party_root),
  ];
  pairs.retain(|(old, new)| !old.is_empty() && old != new);
  pairs.sort_by_key(|(old, _)| std::cmp::Reverse(old.len()));
  if pairs.is_empty() {
    return value.clone();
  }
  rebase_value(value, &pairs)
}

fn rebase_value(value: &SnapshotValue, pairs: &[(&str, &str)]) -> SnapshotValue {
  match value {
    SnapshotValue::Null | SnapshotValue::Bool(_) | SnapshotValue::Int(_) => value.clone(),
    SnapshotValue::Str(text) => SnapshotValue::Str(replace_roots(text, pairs)),
    SnapshotValue::Seq(items) => SnapshotValue::Seq(items.iter().map(|v| rebase_value(v, pairs)).collect()),
    SnapshotValue::Map(map) => SnapshotValue::Map(
      map
        .iter()
        .map(|(k, v)| (k.clone(), rebase_value(v, pairs)))
        .collect::<BTreeMap<_, _>>(),
    ),
    SnapshotValue::Node { path, sig } => SnapshotValue::Node {
      path: rebase_node_path(path, pairs),
      sig: sig.clone(),
    },
  }
}

/// Re-anchor a node path by its leading root only.
fn rebase_node_path(path: &str, pairs: &[(&str, &str)]) -> String {
  let already_rebased = pairs
    .iter()
    .any(|(old, new)| new.contains(old) && starts_with_root(path, new));
  if already_rebased {
    return path.to_string();
  }
  match pairs.iter().find(|(old, _)| starts_with_root(path, old)) {
    Some((old, new)) => format!("{}{}", new, &path[old.len()..]),
    None => path.to_string(),
  }
}

impl BuildStateSnapshot {
  /// This snapshot moved to the given roots.
  pub fn rebased(&self, engine_root: &str, third_party_root: &str) -> Self {
    Self {
      version: self.version,
      engine_root: engine_root.to_string(),
      third_party_root: third_party_root.to_string(),
      state: rebase(
        &self.state,
        &self.engine_root,
        &self.third_party_root,
        engine_root,
        third_party_root,
      ),
    }
  }
}
