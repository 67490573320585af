//! Make-style dependency file parsing (`-MD -MF`).

/// Return every prerequisite listed in `content`, in first-seen order and
/// without duplicates. Targets are dropped.
pub fn parse_depfile(content: &str) -> Vec<String> {
  let joined = content.replace("\\\r\n", " ").replace("\\\n", " ");
  let mut deps: Vec<String> = Vec::new();
  for line in joined.lines() {
    let Some(rest) = prerequisites(line) else {
      continue;
    };
    for token in split_unescaped(rest) {
      if !deps.contains(&token) {
        deps.push(token);
      }
    }
  }
  deps
}

/// Text after the rule separator: the first `:` followed by whitespace or the
/// end of the line. A `:` inside a drive letter (`C:\`) is not a separator.
fn prerequisites(line: &str) -> Option<&str> {
  let bytes = line.as_bytes();
  for (i, b) in bytes.iter().enumerate() {
    if *b == b':' {
      match bytes.get(i + 1) {
        None => return Some(""),
        Some(next) if next.is_ascii_whitespace() => return Some(&line[i + 1..]),
        _ => {}
      }
    }
  }
  None
}

fn split_unescaped(text: &str) -> Vec<String> {
  let mut tokens = Vec::new();
  let mut current = String::new();
  let mut chars = text.chars().peekable();
  while let Some(c) = chars.next() {
    match c {
      '\\' if matches!(chars.peek(), Some(' ') | Some('#')) => {
        if let Some(escaped) = chars.next() {
          current.push(escaped);
        }
      }
      '$' if chars.peek() == Some(&'$') => {
        chars.next();
        current.push('$');
      }
      c if c.is_whitespace() => {
        if !current.is_empty() {
          tokens.push(std::mem::take(&mut current));
        }
      }
      c => current.push(c),
    }
  }
  if !current.is_empty() {
    tokens.push(current);
  }
  tokens
}
