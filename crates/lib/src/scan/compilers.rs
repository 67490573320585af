//! Per-compiler dependency reporting.
//!
//! Each supported compiler family maps to the flags that make it report
//! included files and to the way those reports are recovered.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static MSVC_INCLUDE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^Note: including file:\s*(.+?)\s*$").expect("valid /showIncludes pattern"));

static CLANG_INCLUDE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\.+ (.+?)\s*$").expect("valid -H pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompilerFamily {
  /// `cl.exe` and `clang-cl`.
  Msvc,
  Clang,
  Gcc,
}

/// How a family hands back its include list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanVariant {
  /// Includes are written to a side-channel file during preprocessing.
  EarlyScan,
  /// Includes are interleaved with the compiler's diagnostic output.
  OutputScan,
}

impl CompilerFamily {
  /// Guess the family from the compiler executable name.
  pub fn detect(program: &Path) -> Option<Self> {
    let stem = program.file_stem()?.to_string_lossy().to_ascii_lowercase();
    match stem.as_str() {
      "cl" | "clang-cl" => Some(Self::Msvc),
      s if s == "clang" || s == "clang++" || s.starts_with("clang-") => Some(Self::Clang),
      s if s == "gcc" || s == "g++" || s == "cc" || s == "c++" || s.starts_with("gcc-") || s.starts_with("g++-") => {
        Some(Self::Gcc)
      }
      _ => None,
    }
  }

  pub fn variant(&self) -> ScanVariant {
    match self {
      Self::Msvc | Self::Clang => ScanVariant::OutputScan,
      Self::Gcc => ScanVariant::EarlyScan,
    }
  }

  /// Extra arguments that turn on include reporting.
  ///
  /// `depfile` is only used by early-scan families.
  pub fn report_flags(&self, depfile: &Path) -> Vec<String> {
    match self {
      Self::Msvc => vec!["/showIncludes".to_string()],
      Self::Clang => vec!["-H".to_string()],
      Self::Gcc => vec!["-MD".to_string(), "-MF".to_string(), depfile.to_string_lossy().into_owned()],
    }
  }

  /// Extract the included path from a diagnostic line, if it is an include
  /// report.
  pub fn match_line<'a>(&self, line: &'a str) -> Option<&'a str> {
    let pattern = match self {
      Self::Msvc => &*MSVC_INCLUDE,
      Self::Clang => &*CLANG_INCLUDE,
      Self::Gcc => return None,
    };
    pattern.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str())
  }
}

impl std::fmt::Display for CompilerFamily {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Self::Msvc => "msvc",
      Self::Clang => "clang",
      Self::Gcc => "gcc",
    };
    write!(f, "{}", name)
  }
}
