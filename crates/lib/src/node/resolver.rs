//! Memoized path-to-node resolution.
//!
//! Every worker shares one [`NodeResolver`]. The memo table is locked for the
//! whole lookup-or-insert so two workers asking for the same path always get
//! the same [`Node`] object back.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, trace};

use super::types::{BuildRoots, Node, RootTag};
use crate::util::path::normalize_lexical;

/// Errors that can occur while resolving a path to a node.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// Neither the memo table nor the filesystem knows the path.
  #[error("file does not exist: {}", path.display())]
  NotFound { root: RootTag, rel: String, path: PathBuf },

  /// An absolute path that lies under none of the build roots.
  #[error("path is outside every build root: {}", path.display())]
  OutsideRoots { path: PathBuf },

  /// A relative path that is empty or climbs above its root.
  #[error("path '{rel}' does not name an entry below the {root} root")]
  EscapesRoot { root: RootTag, rel: String },
}

/// Thread-safe, memoized mapping from `(root, path)` to [`Node`].
pub struct NodeResolver {
  roots: BuildRoots,
  case_insensitive: bool,
  nodes: Mutex<HashMap<(RootTag, String), Node>>,
}

impl NodeResolver {
  pub fn new(roots: BuildRoots, case_insensitive: bool) -> Self {
    Self {
      roots,
      case_insensitive,
      nodes: Mutex::new(HashMap::new()),
    }
  }

  pub fn roots(&self) -> &BuildRoots {
    &self.roots
  }

  pub fn case_insensitive(&self) -> bool {
    self.case_insensitive
  }

  /// Resolve an existing file below `root`.
  ///
  /// On a case-insensitive filesystem the on-disk casing is looked up, so
  /// differently-cased spellings of one file converge on one node.
  pub fn resolve(&self, root: RootTag, rel: &str) -> Result<Node, ResolveError> {
    let rel = clean_rel(root, rel)?;
    let mut nodes = self.lock();
    if let Some(node) = nodes.get(&(root, rel.clone())) {
      return Ok(node.clone());
    }

    let on_disk = if self.case_insensitive {
      self.find_casing(root, &rel)
    } else {
      self.root_join(root, &rel).exists().then(|| rel.clone())
    };
    let Some(on_disk) = on_disk else {
      return Err(ResolveError::NotFound {
        root,
        path: self.root_join(root, &rel),
        rel,
      });
    };

    let node = match nodes.get(&(root, on_disk.clone())) {
      Some(existing) => existing.clone(),
      None => {
        trace!(root = %root, rel = %on_disk, "new node");
        let node = Node::new(root, on_disk.clone());
        nodes.insert((root, on_disk.clone()), node.clone());
        node
      }
    };
    if on_disk != rel {
      debug!(requested = %rel, actual = %on_disk, "corrected path casing");
      nodes.insert((root, rel), node.clone());
    }
    Ok(node)
  }

  /// Resolve an absolute path by first finding the root it lies under.
  pub fn resolve_abs(&self, path: &Path) -> Result<Node, ResolveError> {
    let path = normalize_lexical(path);
    let (root, rel) = self
      .roots
      .classify(&path, self.case_insensitive)
      .ok_or_else(|| ResolveError::OutsideRoots { path: path.clone() })?;
    self.resolve(root, &rel)
  }

  /// Return the node for `rel` without requiring it to exist yet.
  ///
  /// Used for step outputs, which only appear once the step has run.
  pub fn declare(&self, root: RootTag, rel: &str) -> Result<Node, ResolveError> {
    let rel = clean_rel(root, rel)?;
    let mut nodes = self.lock();
    let node = nodes
      .entry((root, rel.clone()))
      .or_insert_with(|| Node::new(root, rel))
      .clone();
    Ok(node)
  }

  /// Number of distinct memo keys.
  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(RootTag, String), Node>> {
    self.nodes.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn root_join(&self, root: RootTag, rel: &str) -> PathBuf {
    let mut path = self.roots.path(root).to_path_buf();
    path.extend(rel.split('/'));
    path
  }

  /// Walk `rel` component by component, matching each name against the
  /// directory listing ignoring case.
  fn find_casing(&self, root: RootTag, rel: &str) -> Option<String> {
    let mut dir = self.roots.path(root).to_path_buf();
    let mut actual: Vec<String> = Vec::new();
    for part in rel.split('/') {
      let exact = dir.join(part);
      let name = match fs::read_dir(&dir) {
        Ok(entries) => {
          let names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
          if names.iter().any(|n| n == part) {
            part.to_string()
          } else {
            names.into_iter().find(|n| n.eq_ignore_ascii_case(part))?
          }
        }
        Err(_) if exact.exists() => part.to_string(),
        Err(_) => return None,
      };
      dir.push(&name);
      actual.push(name);
    }
    Some(actual.join("/"))
  }
}

/// Normalize a root-relative path to `/`-separated form, folding `.` and `..`.
fn clean_rel(root: RootTag, rel: &str) -> Result<String, ResolveError> {
  let mut parts: Vec<&str> = Vec::new();
  for part in rel.split(['/', '\\']) {
    match part {
      "" | "." => {}
      ".." => {
        if parts.pop().is_none() {
          return Err(ResolveError::EscapesRoot {
            root,
            rel: rel.to_string(),
          });
        }
      }
      other => parts.push(other),
    }
  }
  if parts.is_empty() {
    return Err(ResolveError::EscapesRoot {
      root,
      rel: rel.to_string(),
    });
  }
  Ok(parts.join("/"))
}
