//! Ls command implementation.
//!
//! Lists published cache entries with their size and age. Entries older than
//! the retention window are flagged; removing them is left to the external
//! sweep.

use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::{Context, Result, bail};
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;
use tracing::debug;

use stepcache_lib::cache::{CacheEntry, list_entries};
use stepcache_lib::config::CacheConfig;
use stepcache_lib::consts::ENV_CACHE_ROOT;

use crate::output::{OutputFormat, format_bytes, print_info, print_json, print_stat, short_ssig, symbols};

#[derive(Serialize)]
struct ListedEntry {
  #[serde(flatten)]
  entry: CacheEntry,
  age_days: u64,
  expired: bool,
}

#[derive(Serialize)]
struct Listing {
  cache_root: PathBuf,
  days_to_keep: u32,
  entries: Vec<ListedEntry>,
}

pub fn cmd_ls(cache: Option<PathBuf>, output: OutputFormat) -> Result<()> {
  let config = CacheConfig::from_env().context("Invalid cache configuration")?;
  let Some(cache_root) = cache.or(config.cache_root) else {
    bail!("No cache root given; pass --cache or set {}", ENV_CACHE_ROOT);
  };

  let now = SystemTime::now();
  let entries = list_entries(&cache_root)
    .with_context(|| format!("Failed to list cache entries in {}", cache_root.display()))?
    .into_iter()
    .map(|entry| {
      let age_days = entry.age_days(now);
      ListedEntry {
        entry,
        age_days,
        expired: age_days > u64::from(config.days_to_keep),
      }
    })
    .collect::<Vec<_>>();
  debug!(root = ?cache_root, entries = entries.len(), "listed cache entries");

  let listing = Listing {
    cache_root,
    days_to_keep: config.days_to_keep,
    entries,
  };

  if output.is_json() {
    return print_json(&listing);
  }

  if listing.entries.is_empty() {
    print_info(&format!("No entries in {}", listing.cache_root.display()));
    return Ok(());
  }

  for listed in &listing.entries {
    let last_used = humantime::format_rfc3339_seconds(listed.entry.modified);
    let line = format!(
      "{} {:>3} file(s) {:>10}  {}d  {}",
      short_ssig(&listed.entry.ssig),
      listed.entry.files,
      format_bytes(listed.entry.size),
      listed.age_days,
      last_used
    );
    if listed.expired {
      println!(
        "  {} {}",
        symbols::WARNING.if_supports_color(Stream::Stdout, |s| s.yellow()),
        line.if_supports_color(Stream::Stdout, |s| s.dimmed())
      );
    } else {
      println!("  {} {}", symbols::INFO, line);
    }
  }

  let total: u64 = listing.entries.iter().map(|e| e.entry.size).sum();
  let expired = listing.entries.iter().filter(|e| e.expired).count();
  println!();
  print_stat("Entries", &listing.entries.len().to_string());
  print_stat("Total size", &format_bytes(total));
  print_stat(
    &format!("Older than {} days", listing.days_to_keep),
    &expired.to_string(),
  );

  Ok(())
}
