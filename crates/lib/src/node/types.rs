use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::util::hash::Digest;
use crate::util::path::{relative_to, replace_roots};

/// Which root a [`Node`] is anchored at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootTag {
  /// The engine (source) tree.
  Engine,
  /// The third-party SDK tree.
  ThirdParty,
  /// The build-output tree.
  Output,
}

impl RootTag {
  pub const ALL: [RootTag; 3] = [RootTag::Engine, RootTag::ThirdParty, RootTag::Output];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Engine => "engine",
      Self::ThirdParty => "third_party",
      Self::Output => "output",
    }
  }

  /// Placeholder substituted for this root when absolute paths are
  /// normalized for hashing.
  pub fn placeholder(&self) -> &'static str {
    match self {
      Self::Engine => "@ENGINE@",
      Self::ThirdParty => "@3RDPARTY@",
      Self::Output => "@OUTPUT@",
    }
  }

  /// Whether includes under this root become dependency edges.
  pub fn is_tracked(&self) -> bool {
    matches!(self, Self::Engine | Self::Output)
  }
}

impl fmt::Display for RootTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// The absolute roots of the current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRoots {
  pub engine: PathBuf,
  pub third_party: PathBuf,
  pub output: PathBuf,
}

impl BuildRoots {
  pub fn new(engine: impl Into<PathBuf>, third_party: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
    Self {
      engine: engine.into(),
      third_party: third_party.into(),
      output: output.into(),
    }
  }

  /// Resolve symlinks in every root, without the `\\?\` prefix on Windows.
  ///
  /// Compilers report real paths, so roots given through a symlink would
  /// otherwise classify every include as out-of-tree.
  pub fn canonicalize(&self) -> std::io::Result<Self> {
    Ok(Self {
      engine: dunce::canonicalize(&self.engine)?,
      third_party: dunce::canonicalize(&self.third_party)?,
      output: dunce::canonicalize(&self.output)?,
    })
  }

  pub fn path(&self, tag: RootTag) -> &Path {
    match tag {
      RootTag::Engine => &self.engine,
      RootTag::ThirdParty => &self.third_party,
      RootTag::Output => &self.output,
    }
  }

  /// Roots ordered longest first, so a root nested inside another wins.
  pub fn by_specificity(&self) -> Vec<RootTag> {
    let mut tags = RootTag::ALL.to_vec();
    tags.sort_by_key(|tag| std::cmp::Reverse(self.path(*tag).components().count()));
    tags
  }

  /// Split an absolute path into the root it lies under and its suffix.
  pub fn classify(&self, path: &Path, case_insensitive: bool) -> Option<(RootTag, String)> {
    self
      .by_specificity()
      .into_iter()
      .find_map(|tag| relative_to(path, self.path(tag), case_insensitive).map(|rel| (tag, rel)))
  }

  /// Replace every root occurring in `text` with its placeholder.
  pub fn strip_roots(&self, text: &str) -> String {
    let roots: Vec<(String, &str)> = RootTag::ALL
      .iter()
      .map(|tag| (self.path(*tag).to_string_lossy().into_owned(), tag.placeholder()))
      .collect();
    let pairs: Vec<(&str, &str)> = roots.iter().map(|(root, placeholder)| (root.as_str(), *placeholder)).collect();
    replace_roots(text, &pairs)
  }
}

struct NodeData {
  root: RootTag,
  rel: String,
  signature: RwLock<Option<Digest>>,
}

/// A root-relative handle to a file in the build graph.
///
/// Cloning a `Node` clones the handle, not the file entry: all clones share
/// one content signature. Equality and hashing are structural (root tag plus
/// relative path); [`Node::ptr_eq`] checks object identity.
#[derive(Clone)]
pub struct Node(Arc<NodeData>);

impl Node {
  pub(crate) fn new(root: RootTag, rel: impl Into<String>) -> Self {
    Self(Arc::new(NodeData {
      root,
      rel: rel.into(),
      signature: RwLock::new(None),
    }))
  }

  pub fn root(&self) -> RootTag {
    self.0.root
  }

  /// Path below the root, `/`-separated.
  pub fn rel_path(&self) -> &str {
    &self.0.rel
  }

  /// Final path component.
  pub fn name(&self) -> &str {
    self.0.rel.rsplit('/').next().unwrap_or(&self.0.rel)
  }

  /// Parent's path below the same root, or `None` for a top-level entry.
  pub fn parent_rel(&self) -> Option<&str> {
    self.0.rel.rsplit_once('/').map(|(parent, _)| parent)
  }

  /// Resolve to an absolute path; only used at the OS-call boundary.
  pub fn abs_path(&self, roots: &BuildRoots) -> PathBuf {
    let mut path = roots.path(self.0.root).to_path_buf();
    for part in self.0.rel.split('/').filter(|p| !p.is_empty()) {
      path.push(part);
    }
    path
  }

  /// Case-folded `root/rel` form used for identity hashing.
  pub fn normalized(&self) -> String {
    format!("{}/{}", self.0.root.placeholder(), self.0.rel.to_lowercase())
  }

  pub fn signature(&self) -> Option<Digest> {
    self.0.signature.read().map(|s| s.clone()).unwrap_or_else(|e| e.into_inner().clone())
  }

  pub fn set_signature(&self, signature: Option<Digest>) {
    let mut guard = self.0.signature.write().unwrap_or_else(|e| e.into_inner());
    *guard = signature;
  }

  pub fn ptr_eq(&self, other: &Node) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }
}

impl PartialEq for Node {
  fn eq(&self, other: &Self) -> bool {
    self.ptr_eq(other) || (self.0.root == other.0.root && self.0.rel == other.0.rel)
  }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    self.0.root.hash(state);
    self.0.rel.hash(state);
  }
}

impl fmt::Debug for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Node({}:{})", self.0.root, self.0.rel)
  }
}

impl fmt::Display for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.0.root, self.0.rel)
  }
}
