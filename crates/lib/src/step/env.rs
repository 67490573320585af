//! Immutable build-environment scopes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ENV_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`BuildEnv`].
///
/// Two environments never share an id, even if their contents match, so a
/// memo keyed by `EnvId` can never outlive the values it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvId(u64);

impl EnvId {
  fn next() -> Self {
    Self(NEXT_ENV_ID.fetch_add(1, Ordering::Relaxed))
  }
}

/// A scope of build variables (`CXXFLAGS`, `DEFINES`, ...), each holding a
/// list of values, with an optional parent scope.
#[derive(Debug)]
pub struct BuildEnv {
  id: EnvId,
  vars: BTreeMap<String, Vec<String>>,
  parent: Option<Arc<BuildEnv>>,
}

impl BuildEnv {
  pub fn new<K, V, I>(vars: I) -> Self
  where
    K: Into<String>,
    V: IntoIterator,
    V::Item: Into<String>,
    I: IntoIterator<Item = (K, V)>,
  {
    Self {
      id: EnvId::next(),
      vars: collect_vars(vars),
      parent: None,
    }
  }

  pub fn empty() -> Self {
    Self::new(Vec::<(String, Vec<String>)>::new())
  }

  /// A child scope that falls back to `parent` for unset variables.
  pub fn child<K, V, I>(parent: Arc<BuildEnv>, vars: I) -> Self
  where
    K: Into<String>,
    V: IntoIterator,
    V::Item: Into<String>,
    I: IntoIterator<Item = (K, V)>,
  {
    Self {
      id: EnvId::next(),
      vars: collect_vars(vars),
      parent: Some(parent),
    }
  }

  /// Copy of this scope with one variable replaced. The copy gets a new id.
  pub fn with_var<V>(&self, name: impl Into<String>, values: V) -> Self
  where
    V: IntoIterator,
    V::Item: Into<String>,
  {
    let mut vars = self.vars.clone();
    vars.insert(name.into(), values.into_iter().map(Into::into).collect());
    Self {
      id: EnvId::next(),
      vars,
      parent: self.parent.clone(),
    }
  }

  pub fn id(&self) -> EnvId {
    self.id
  }

  pub fn parent(&self) -> Option<&Arc<BuildEnv>> {
    self.parent.as_ref()
  }

  /// Values of `name`, falling back to the parent scope when the variable is
  /// unset or empty here.
  pub fn get(&self, name: &str) -> Option<&[String]> {
    match self.vars.get(name) {
      Some(values) if !values.is_empty() => Some(values),
      _ => self.parent.as_deref().and_then(|p| p.get(name)),
    }
  }
}

fn collect_vars<K, V, I>(vars: I) -> BTreeMap<String, Vec<String>>
where
  K: Into<String>,
  V: IntoIterator,
  V::Item: Into<String>,
  I: IntoIterator<Item = (K, V)>,
{
  vars
    .into_iter()
    .map(|(k, v)| (k.into(), v.into_iter().map(Into::into).collect()))
    .collect()
}
