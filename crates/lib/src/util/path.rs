//! Lexical path helpers.
//!
//! Nothing here touches the filesystem. Root matching is always done on
//! component boundaries so that `/src` never matches `/src2`.

use std::path::{Component, Path, PathBuf};

/// Remove `.` components and fold `..` into its parent.
///
/// A `..` that would climb above the root (or above the start of a relative
/// path) is kept as-is.
pub fn normalize_lexical(path: &Path) -> PathBuf {
  let mut out: Vec<Component<'_>> = Vec::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => match out.last() {
        Some(Component::Normal(_)) => {
          out.pop();
        }
        Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
        _ => out.push(component),
      },
      other => out.push(other),
    }
  }
  out.iter().collect()
}

/// Join the components of a relative path with `/`.
pub fn to_slash(path: &Path) -> String {
  path
    .components()
    .filter_map(|c| match c {
      Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
      _ => None,
    })
    .collect::<Vec<_>>()
    .join("/")
}

/// Return the `/`-joined suffix of `path` below `root`, if `path` lies under it.
///
/// With `case_insensitive`, components are compared ignoring ASCII case,
/// which is how Windows and default macOS volumes treat names.
pub fn relative_to(path: &Path, root: &Path, case_insensitive: bool) -> Option<String> {
  let mut path_iter = path.components();
  for root_component in root.components() {
    let path_component = path_iter.next()?;
    let same = if case_insensitive {
      root_component
        .as_os_str()
        .to_string_lossy()
        .eq_ignore_ascii_case(&path_component.as_os_str().to_string_lossy())
    } else {
      root_component == path_component
    };
    if !same {
      return None;
    }
  }
  Some(to_slash(path_iter.as_path()))
}

fn is_path_char(c: char) -> bool {
  c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '+' | '~' | '@' | '$')
}

/// True when `text` starts with `prefix` and the match ends on a boundary
/// (end of text, a separator, or any character that cannot continue a name).
pub fn starts_with_root(text: &str, prefix: &str) -> bool {
  if prefix.is_empty() || !text.starts_with(prefix) {
    return false;
  }
  if prefix.ends_with(['/', '\\']) {
    return true;
  }
  match text[prefix.len()..].chars().next() {
    None => true,
    Some(c) => !is_path_char(c),
  }
}

/// Rewrite every occurrence of `old` (on a boundary) inside `text` to `new`.
pub fn replace_root(text: &str, old: &str, new: &str) -> String {
  replace_roots(text, &[(old, new)])
}

/// Rewrite every root occurrence in `text` in one pass, trying longer old
/// roots first.
///
/// When a new root contains its old root (`/a` to `/a/b`, `/src` to
/// `/home/src`), text already under the new root is copied unchanged so that
/// rewriting already-rewritten text is a no-op.
pub fn replace_roots(text: &str, pairs: &[(&str, &str)]) -> String {
  let mut pairs: Vec<(&str, &str)> = pairs
    .iter()
    .copied()
    .filter(|(old, new)| !old.is_empty() && old != new)
    .collect();
  if pairs.is_empty() || !pairs.iter().any(|(old, _)| text.contains(old)) {
    return text.to_string();
  }
  pairs.sort_by_key(|(old, _)| std::cmp::Reverse(old.len()));
  let guards: Vec<&str> = pairs
    .iter()
    .filter(|(old, new)| new.contains(old))
    .map(|(_, new)| *new)
    .collect();

  let mut out = String::with_capacity(text.len());
  let mut rest = text;
  while !rest.is_empty() {
    if let Some(new) = guards.iter().find(|new| starts_with_root(rest, new)) {
      out.push_str(new);
      rest = &rest[new.len()..];
    } else if let Some((old, new)) = pairs.iter().find(|(old, _)| starts_with_root(rest, old)) {
      out.push_str(new);
      rest = &rest[old.len()..];
    } else {
      let step = rest.chars().next().map(char::len_utf8).unwrap_or(1);
      out.push_str(&rest[..step]);
      rest = &rest[step..];
    }
  }
  out
}
