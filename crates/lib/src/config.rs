//! Artifact cache settings read from the process environment.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::consts::{
  DEFAULT_DAYS_TO_KEEP, ENV_CACHE_DAYS_TO_KEEP, ENV_CACHE_RESTORE, ENV_CACHE_ROOT, ENV_CACHE_UPLOAD,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("{var}: expected a boolean (1/0, true/false, yes/no, on/off), got '{value}'")]
  InvalidBool { var: &'static str, value: String },

  #[error("{var}: expected a non-negative integer, got '{value}'")]
  InvalidNumber { var: &'static str, value: String },
}

/// Where the shared cache lives and which directions are enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheConfig {
  /// Cache root; `None` disables the cache entirely.
  pub cache_root: Option<PathBuf>,
  pub restore: bool,
  pub upload: bool,
  /// Retention age consumed by the external sweep.
  pub days_to_keep: u32,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      cache_root: None,
      restore: true,
      upload: false,
      days_to_keep: DEFAULT_DAYS_TO_KEEP,
    }
  }
}

impl CacheConfig {
  /// Build a config from the `STEPCACHE_ARTIFACTS_CACHE*` variables.
  pub fn from_env() -> Result<Self, ConfigError> {
    let defaults = Self::default();
    let cache_root = non_empty_var(ENV_CACHE_ROOT).map(PathBuf::from);
    let restore = match non_empty_var(ENV_CACHE_RESTORE) {
      Some(value) => parse_bool(ENV_CACHE_RESTORE, &value)?,
      None => defaults.restore,
    };
    let upload = match non_empty_var(ENV_CACHE_UPLOAD) {
      Some(value) => parse_bool(ENV_CACHE_UPLOAD, &value)?,
      None => defaults.upload,
    };
    let days_to_keep = match non_empty_var(ENV_CACHE_DAYS_TO_KEEP) {
      Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        var: ENV_CACHE_DAYS_TO_KEEP,
        value,
      })?,
      None => defaults.days_to_keep,
    };

    Ok(Self {
      cache_root,
      restore,
      upload,
      days_to_keep,
    })
  }

  /// A config with both directions enabled for `root`.
  pub fn enabled(root: impl Into<PathBuf>) -> Self {
    Self {
      cache_root: Some(root.into()),
      restore: true,
      upload: true,
      days_to_keep: DEFAULT_DAYS_TO_KEEP,
    }
  }

  pub fn restore_enabled(&self) -> bool {
    self.cache_root.is_some() && self.restore
  }

  pub fn upload_enabled(&self) -> bool {
    self.cache_root.is_some() && self.upload
  }
}

fn non_empty_var(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
  match value.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Ok(true),
    "0" | "false" | "no" | "off" => Ok(false),
    _ => Err(ConfigError::InvalidBool {
      var,
      value: value.to_string(),
    }),
  }
}
