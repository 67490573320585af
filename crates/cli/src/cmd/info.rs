//! Info command implementation.
//!
//! Shows the cache configuration the build would pick up from the
//! environment, and the host defaults used by the dependency scanner.

use anyhow::{Context, Result};
use serde::Serialize;

use stepcache_lib::config::CacheConfig;
use stepcache_lib::consts::{APP_NAME, ENV_CACHE_ROOT};
use stepcache_lib::platform::os::Os;
use stepcache_lib::scan::ScannerConfig;

use crate::output::{OutputFormat, print_info, print_json, print_stat, print_warning};

#[derive(Serialize)]
struct InfoReport {
  version: &'static str,
  os: Option<Os>,
  cache: CacheConfig,
  max_command_len: usize,
  case_insensitive: bool,
}

pub fn cmd_info(output: OutputFormat) -> Result<()> {
  let cache = CacheConfig::from_env().context("Invalid cache configuration")?;
  let scanner = ScannerConfig::default();
  let report = InfoReport {
    version: env!("CARGO_PKG_VERSION"),
    os: Os::host(),
    cache,
    max_command_len: scanner.max_command_len,
    case_insensitive: scanner.case_insensitive,
  };

  if output.is_json() {
    return print_json(&report);
  }

  print_info(&format!("{} v{}", APP_NAME, report.version));
  match report.os {
    Some(os) => print_stat("Platform", os.name()),
    None => print_warning("Could not detect platform."),
  }
  println!();
  println!("Artifact cache:");
  match &report.cache.cache_root {
    Some(root) => print_stat("Root", &root.display().to_string()),
    None => print_stat("Root", &format!("(disabled, set {})", ENV_CACHE_ROOT)),
  }
  print_stat("Restore", &report.cache.restore_enabled().to_string());
  print_stat("Upload", &report.cache.upload_enabled().to_string());
  print_stat("Days to keep", &report.cache.days_to_keep.to_string());
  println!();
  println!("Scanner:");
  print_stat("Max command length", &report.max_command_len.to_string());
  print_stat("Case-insensitive paths", &report.case_insensitive.to_string());

  Ok(())
}
