//! Dependency discovery from the compiler's own include reports.
//!
//! [`DependencyScanner::scan_and_compile`] runs the real compile with the
//! family's include-reporting flags turned on, then turns the reported paths
//! into dependency edges on the step:
//!
//! 1. Output-scan families (`/showIncludes`, `-H`) interleave include reports
//!    with diagnostics; every other line is passed through to the build log.
//! 2. Early-scan families write a make-style depfile during preprocessing.
//! 3. Paths under the engine or output root become edges; third-party and
//!    system headers are dropped.
//!
//! Edges are only recorded after a successful compile. A failed or cancelled
//! compile leaves the step's previous edges untouched.

pub mod compilers;
pub mod depfile;
pub mod response;
pub mod types;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::consts::COMPILER_LOG_TARGET;
use crate::node::{Node, NodeResolver};
use crate::step::{BuildStep, ScanState};
use crate::util::path::normalize_lexical;

pub use compilers::{CompilerFamily, ScanVariant};
pub use types::{CompileCommand, CompileFailure, ScanError, ScanReport, ScannerConfig};

/// Wraps compiler invocation and records each step's dependency edges.
pub struct DependencyScanner {
  resolver: Arc<NodeResolver>,
  config: ScannerConfig,
}

impl DependencyScanner {
  pub fn new(resolver: Arc<NodeResolver>, config: ScannerConfig) -> Self {
    Self { resolver, config }
  }

  pub fn config(&self) -> &ScannerConfig {
    &self.config
  }

  /// Run `command` for `step` and replace the step's dependency edges with
  /// the includes it reports.
  ///
  /// Output lines that are not include reports are forwarded to the log and
  /// kept in [`ScanReport::passthrough`]: all of stdout first, then all of
  /// stderr. The interleaving between the two streams is not preserved.
  pub async fn scan_and_compile(
    &self,
    step: &BuildStep,
    command: &CompileCommand,
    cancel: &CancellationToken,
  ) -> Result<ScanReport, ScanError> {
    let family = self
      .config
      .compiler
      .or_else(|| CompilerFamily::detect(&command.program))
      .ok_or_else(|| ScanError::UnsupportedCompiler {
        program: command.program.clone(),
      })?;

    if cancel.is_cancelled() {
      return Err(fail(step, ScanError::Cancelled { step: step.name().to_string() }));
    }
    step.set_state(ScanState::Running);

    let depfile = match family.variant() {
      ScanVariant::EarlyScan => Some(
        tempfile::Builder::new()
          .prefix("stepcache-")
          .suffix(".d")
          .tempfile()
          .map_err(|e| fail(step, ScanError::TempFile(e)))?,
      ),
      ScanVariant::OutputScan => None,
    };
    let depfile_path = depfile.as_ref().map(|f| f.path().to_path_buf()).unwrap_or_default();

    let mut args = command.args.clone();
    args.extend(family.report_flags(&depfile_path));
    let prepared = response::prepare(&command.program, args, self.config.max_command_len)
      .map_err(|e| fail(step, ScanError::TempFile(e)))?;

    let cwd = step.cwd().unwrap_or(self.resolver.roots().output.as_path()).to_path_buf();
    let mut child = Command::new(&command.program);
    child
      .args(&prepared.args)
      .current_dir(&cwd)
      .stdin(Stdio::null())
      .kill_on_drop(true);

    debug!(step = %step.name(), compiler = %family, cwd = ?cwd, "running compiler");

    let output = tokio::select! {
      _ = cancel.cancelled() => {
        info!(step = %step.name(), "compile cancelled");
        return Err(fail(step, ScanError::Cancelled { step: step.name().to_string() }));
      }
      output = child.output() => output.map_err(|source| {
        fail(step, ScanError::Spawn { program: command.program.clone(), source })
      })?,
    };
    drop(prepared);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut reported: Vec<String> = Vec::new();
    let mut passthrough: Vec<String> = Vec::new();
    for line in stdout.lines().chain(stderr.lines()) {
      match family.match_line(line) {
        Some(path) => reported.push(path.to_string()),
        None => {
          info!(target: COMPILER_LOG_TARGET, "{}", line);
          passthrough.push(line.to_string());
        }
      }
    }

    if !output.status.success() {
      let failure = CompileFailure {
        step: step.name().to_string(),
        module: step.labels().module.clone(),
        target: step.labels().target.clone(),
        configuration: step.labels().configuration.clone(),
        command_line: command.display_line(),
        exit_code: output.status.code(),
        output: passthrough.join("\n"),
      };
      warn!(step = %step.name(), code = ?output.status.code(), "compile failed");
      return Err(fail(step, ScanError::CompileFailed(Box::new(failure))));
    }

    if let Some(depfile) = &depfile {
      let content = std::fs::read_to_string(depfile.path()).map_err(|source| {
        fail(
          step,
          ScanError::Depfile {
            path: depfile.path().to_path_buf(),
            source,
          },
        )
      })?;
      reported.extend(depfile::parse_depfile(&content));
    }

    let dependencies = self.resolve_reported(step, &cwd, &reported).map_err(|e| fail(step, e))?;
    let count = dependencies.len();
    step.set_dependencies(dependencies);
    step.set_state(ScanState::Succeeded);
    debug!(step = %step.name(), reported = reported.len(), dependencies = count, "compile succeeded");

    Ok(ScanReport {
      exit_code: output.status.code().unwrap_or(0),
      dependencies: count,
      passthrough,
    })
  }

  /// Turn reported include paths into nodes, keeping only in-tree files.
  fn resolve_reported(&self, step: &BuildStep, cwd: &Path, reported: &[String]) -> Result<Vec<Node>, ScanError> {
    let roots = self.resolver.roots();
    let mut seen: HashSet<Node> = step.inputs().iter().cloned().collect();
    let mut nodes = Vec::new();

    for raw in reported {
      let path = PathBuf::from(raw);
      let path = normalize_lexical(&if path.is_absolute() { path } else { cwd.join(path) });
      let Some((root, rel)) = roots.classify(&path, self.config.case_insensitive) else {
        trace!(path = ?path, "ignoring out-of-tree include");
        continue;
      };
      if !root.is_tracked() {
        trace!(path = ?path, root = %root, "ignoring untracked include");
        continue;
      }
      let node = self.resolver.resolve(root, &rel).map_err(|source| ScanError::Resolve {
        step: step.name().to_string(),
        source,
      })?;
      if seen.insert(node.clone()) {
        nodes.push(node);
      }
    }
    Ok(nodes)
  }
}

fn fail(step: &BuildStep, error: ScanError) -> ScanError {
  step.set_state(ScanState::Failed);
  error
}
