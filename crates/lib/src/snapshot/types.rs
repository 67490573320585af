use std::collections::BTreeMap;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::SNAPSHOT_VERSION;
use crate::node::BuildRoots;
use crate::util::hash::Digest;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
  #[error("failed to create snapshot directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to read snapshot: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write snapshot: {0}")]
  Write(#[source] io::Error),

  #[error("failed to parse snapshot: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize snapshot: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported snapshot version {0} (expected {SNAPSHOT_VERSION})")]
  UnsupportedVersion(u32),
}

/// A node of the serialized build-state tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SnapshotValue {
  Null,
  Bool(bool),
  Int(i64),
  Str(String),
  Seq(Vec<SnapshotValue>),
  Map(BTreeMap<String, SnapshotValue>),
  /// A file reference, recorded as the absolute path on the writing machine
  /// plus its content signature at the time.
  Node { path: String, sig: Option<Digest> },
}

impl SnapshotValue {
  pub fn map() -> Self {
    Self::Map(BTreeMap::new())
  }

  pub fn get(&self, key: &str) -> Option<&SnapshotValue> {
    match self {
      Self::Map(map) => map.get(key),
      _ => None,
    }
  }

  pub fn as_seq(&self) -> Option<&[SnapshotValue]> {
    match self {
      Self::Seq(items) => Some(items),
      _ => None,
    }
  }

  /// Insert into a map value, turning any other value into an empty map first.
  pub fn insert(&mut self, key: impl Into<String>, value: SnapshotValue) {
    if !matches!(self, Self::Map(_)) {
      *self = Self::map();
    }
    if let Self::Map(map) = self {
      map.insert(key.into(), value);
    }
  }
}

/// The persisted build state plus the roots it was written under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStateSnapshot {
  pub version: u32,
  pub engine_root: String,
  pub third_party_root: String,
  pub state: SnapshotValue,
}

impl BuildStateSnapshot {
  /// An empty snapshot for the current run.
  pub fn new(roots: &BuildRoots) -> Self {
    Self {
      version: SNAPSHOT_VERSION,
      engine_root: roots.engine.to_string_lossy().into_owned(),
      third_party_root: roots.third_party.to_string_lossy().into_owned(),
      state: SnapshotValue::map(),
    }
  }
}
