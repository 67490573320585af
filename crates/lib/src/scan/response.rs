//! Response files for command lines that exceed the OS argument limit.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

/// Arguments to pass to the compiler, plus the response file backing them.
///
/// The file is deleted when this value is dropped, whether or not the
/// compiler ran successfully.
pub struct PreparedArgs {
  pub args: Vec<String>,
  pub response_file: Option<NamedTempFile>,
}

/// Length of the command line as the OS would see it.
pub fn command_len(program: &Path, args: &[String]) -> usize {
  program.as_os_str().len() + args.iter().map(|a| quote_arg(a).len() + 1).sum::<usize>()
}

/// Move `args` into a response file when the command line would be longer
/// than `max_len`.
pub fn prepare(program: &Path, args: Vec<String>, max_len: usize) -> io::Result<PreparedArgs> {
  let len = command_len(program, &args);
  if len <= max_len {
    return Ok(PreparedArgs {
      args,
      response_file: None,
    });
  }

  let mut file = tempfile::Builder::new().prefix("stepcache-").suffix(".rsp").tempfile()?;
  for arg in &args {
    writeln!(file, "{}", quote_arg(arg))?;
  }
  file.flush()?;
  debug!(path = ?file.path(), len, max_len, "command line written to response file");

  Ok(PreparedArgs {
    args: vec![format!("@{}", file.path().display())],
    response_file: Some(file),
  })
}

/// Quote an argument containing whitespace or quotes.
///
/// Backslashes are only doubled where they precede a quote, so plain
/// Windows paths survive unchanged.
pub fn quote_arg(arg: &str) -> String {
  if !arg.is_empty() && !arg.chars().any(|c| c.is_whitespace() || c == '"') {
    return arg.to_string();
  }

  let mut out = String::with_capacity(arg.len() + 2);
  out.push('"');
  let mut backslashes = 0usize;
  for c in arg.chars() {
    match c {
      '\\' => backslashes += 1,
      '"' => {
        out.extend(std::iter::repeat_n('\\', backslashes * 2 + 1));
        out.push('"');
        backslashes = 0;
      }
      c => {
        out.extend(std::iter::repeat_n('\\', backslashes));
        out.push(c);
        backslashes = 0;
      }
    }
  }
  out.extend(std::iter::repeat_n('\\', backslashes * 2));
  out.push('"');
  out
}
