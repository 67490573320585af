//! Hashing utilities for step identities and content signatures.
//!
//! This module provides:
//! - `Digest`: A full 64-character SHA-256 hex digest
//! - `DigestBuilder`: Incremental, field-separated digest construction
//! - `hash_file()`: Single file hashing
//! - `hash_bytes()`: Arbitrary byte hashing

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// An opaque SHA-256 digest in lowercase hexadecimal form.
///
/// Used for a step's `uid` and `sig` and for node content signatures.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(pub String);

impl Digest {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for Digest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Builds a digest from a sequence of fields.
///
/// Every field is preceded by its byte length (little-endian `u64`), so
/// field boundaries are unambiguous whatever bytes the fields contain.
#[derive(Default)]
pub struct DigestBuilder {
  hasher: Sha256,
}

impl DigestBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn field(&mut self, value: &str) -> &mut Self {
    self.hasher.update((value.len() as u64).to_le_bytes());
    self.hasher.update(value.as_bytes());
    self
  }

  pub fn digest(&mut self, value: &Digest) -> &mut Self {
    self.field(value.as_str())
  }

  pub fn finish(self) -> Digest {
    Digest(hex::encode(self.hasher.finalize()))
  }
}

/// Error while hashing file content.
#[derive(Debug, thiserror::Error)]
#[error("failed to read file {path}: {source}")]
pub struct HashFileError {
  pub path: String,
  #[source]
  pub source: std::io::Error,
}

/// Hash a file's contents.
///
/// Returns the full 64-character SHA256 hash of the file.
pub fn hash_file(path: &Path) -> Result<Digest, HashFileError> {
  let read_error = |source| HashFileError {
    path: path.display().to_string(),
    source,
  };

  let mut file = fs::File::open(path).map_err(read_error)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_error)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(Digest(hex::encode(hasher.finalize())))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> Digest {
  Digest(hex::encode(Sha256::digest(data)))
}
