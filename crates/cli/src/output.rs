//! Terminal rendering for cache listings and status lines.
//!
//! Status lines go to stdout, problems to stderr; color is applied only when
//! the target stream supports it.

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream, Style};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

#[derive(Debug, Clone, Copy)]
pub enum Level {
  Success,
  Info,
  Warning,
  Error,
}

impl Level {
  fn symbol(self) -> &'static str {
    match self {
      Level::Success => symbols::SUCCESS,
      Level::Info => symbols::INFO,
      Level::Warning => symbols::WARNING,
      Level::Error => symbols::ERROR,
    }
  }

  fn style(self) -> Style {
    match self {
      Level::Success => Style::new().green(),
      Level::Info => Style::new().blue(),
      Level::Warning => Style::new().yellow(),
      Level::Error => Style::new().red(),
    }
  }

  fn stream(self) -> Stream {
    match self {
      Level::Success | Level::Info => Stream::Stdout,
      Level::Warning | Level::Error => Stream::Stderr,
    }
  }
}

/// Print `message` behind the level's symbol. Problems are colored in full.
pub fn print_status(level: Level, message: &str) {
  let stream = level.stream();
  let text = level.symbol();
  let symbol = text.if_supports_color(stream, |s| s.style(level.style()));
  match level {
    Level::Success | Level::Info => println!("{} {}", symbol, message),
    Level::Warning | Level::Error => eprintln!(
      "{} {}",
      symbol,
      message.if_supports_color(stream, |s| s.style(level.style()))
    ),
  }
}

pub fn print_success(message: &str) {
  print_status(Level::Success, message);
}

pub fn print_info(message: &str) {
  print_status(Level::Info, message);
}

pub fn print_warning(message: &str) {
  print_status(Level::Warning, message);
}

pub fn print_error(message: &str) {
  print_status(Level::Error, message);
}

/// An indented `label: value` line.
pub fn print_stat(label: &str, value: &str) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// A `uid+sig` cache key shortened to the first 12 characters of each half.
///
/// Anything that is not a full 128-character key is cut to 12 characters.
pub fn short_ssig(ssig: &str) -> String {
  match (ssig.get(..12), ssig.get(64..76)) {
    (Some(uid), Some(sig)) if ssig.len() == 128 => format!("{}..{}", uid, sig),
    _ => ssig.chars().take(12).collect(),
  }
}

pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

  let mut value = bytes as f64;
  let mut unit = 0;
  while value >= 1024.0 && unit < UNITS.len() - 1 {
    value /= 1024.0;
    unit += 1;
  }
  if unit == 0 {
    format!("{} B", bytes)
  } else {
    format!("{:.1} {}", value, UNITS[unit])
  }
}
