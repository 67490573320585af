mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::output::{OutputFormat, print_error};

/// stepcache - inspect and maintain the shared build artifact cache
#[derive(Parser)]
#[command(name = "stepcache")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Show the cache configuration read from the environment
  Info,

  /// List cache entries
  Ls {
    /// Cache root (default: $STEPCACHE_ARTIFACTS_CACHE)
    #[arg(long)]
    cache: Option<PathBuf>,
  },

  /// Move a build-state snapshot to new checkout roots
  Rebase {
    /// Snapshot file to rewrite in place
    snapshot: PathBuf,

    /// Engine (source) root of the new checkout
    #[arg(long)]
    engine_root: PathBuf,

    /// Third-party root of the new checkout
    #[arg(long)]
    third_party_root: PathBuf,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .without_time()
    .with_writer(std::io::stderr)
    .init();

  let result = match cli.command {
    Commands::Info => cmd::cmd_info(cli.output),
    Commands::Ls { cache } => cmd::cmd_ls(cache, cli.output),
    Commands::Rebase {
      snapshot,
      engine_root,
      third_party_root,
    } => cmd::cmd_rebase(&snapshot, &engine_root, &third_party_root, cli.output),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
