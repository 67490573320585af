//! Types for compiler invocation and dependency scanning.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use super::compilers::CompilerFamily;
use super::response::quote_arg;
use crate::node::ResolveError;
use crate::platform::{case_insensitive_fs, max_command_len};

/// A compiler invocation without the include-reporting flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileCommand {
  pub program: PathBuf,
  pub args: Vec<String>,
}

impl CompileCommand {
  pub fn new<I>(program: impl Into<PathBuf>, args: I) -> Self
  where
    I: IntoIterator,
    I::Item: Into<String>,
  {
    Self {
      program: program.into(),
      args: args.into_iter().map(Into::into).collect(),
    }
  }

  /// The command as a single shell-style line, for diagnostics.
  pub fn display_line(&self) -> String {
    let mut line = quote_arg(&self.program.to_string_lossy());
    for arg in &self.args {
      line.push(' ');
      line.push_str(&quote_arg(arg));
    }
    line
  }
}

/// Scanner settings for one build session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
  /// Compiler family; `None` detects it from each command's program name.
  pub compiler: Option<CompilerFamily>,
  pub max_command_len: usize,
  pub case_insensitive: bool,
}

impl Default for ScannerConfig {
  fn default() -> Self {
    Self {
      compiler: None,
      max_command_len: max_command_len(),
      case_insensitive: case_insensitive_fs(),
    }
  }
}

/// Result of a successful compile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
  pub exit_code: i32,
  /// Number of dependency edges recorded on the step.
  pub dependencies: usize,
  /// Compiler output lines that were not include reports.
  pub passthrough: Vec<String>,
}

/// Everything known about a failed compile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileFailure {
  pub step: String,
  pub module: String,
  pub target: String,
  pub configuration: String,
  pub command_line: String,
  /// `None` when the compiler was killed by a signal.
  pub exit_code: Option<i32>,
  pub output: String,
}

impl fmt::Display for CompileFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.exit_code {
      Some(code) => writeln!(f, "compile of {} failed with exit code {}", self.step, code)?,
      None => writeln!(f, "compile of {} was terminated by a signal", self.step)?,
    }
    writeln!(f, "  module:        {}", self.module)?;
    writeln!(f, "  target:        {}", self.target)?;
    writeln!(f, "  configuration: {}", self.configuration)?;
    writeln!(f, "  command:       {}", self.command_line)?;
    if !self.output.is_empty() {
      writeln!(f, "  output:")?;
      for line in self.output.lines() {
        writeln!(f, "    {}", line)?;
      }
    }
    Ok(())
  }
}

#[derive(Debug, Error)]
pub enum ScanError {
  #[error("no include-reporting support for compiler {}", program.display())]
  UnsupportedCompiler { program: PathBuf },

  #[error("failed to start {}: {source}", program.display())]
  Spawn {
    program: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to create temporary compiler file: {0}")]
  TempFile(#[source] std::io::Error),

  #[error("failed to read dependency file {}: {source}", path.display())]
  Depfile {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("{0}")]
  CompileFailed(Box<CompileFailure>),

  /// The compiler reported an include that cannot be found on disk.
  #[error("unresolvable dependency of {step}: {source}")]
  Resolve {
    step: String,
    #[source]
    source: ResolveError,
  },

  #[error("compile of {step} was cancelled")]
  Cancelled { step: String },

  /// The worker running the step panicked before reporting a result.
  #[error("worker running {step} stopped unexpectedly")]
  Aborted { step: String },
}
