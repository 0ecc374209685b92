use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

/// linscript - script-defined resource lifecycles on Linux hosts
#[derive(Parser)]
#[command(name = "linscript")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Directory holding persisted resource state
  /// (default: $LINSCRIPT_STATE_DIR or .linscript/state)
  #[arg(long, global = true)]
  state_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Apply a resource file
  Apply {
    /// Path to the resource file
    #[arg(default_value = "resources.json")]
    file: PathBuf,
  },

  /// Show what an apply would do, without executing anything
  Plan {
    /// Path to the resource file
    #[arg(default_value = "resources.json")]
    file: PathBuf,
  },

  /// Destroy every resource with persisted state
  Destroy {
    /// Path to the resource file (used for connection settings)
    #[arg(default_value = "resources.json")]
    file: PathBuf,
  },

  /// Show persisted resource state
  Status,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .without_time()
    .init();

  let cli = Cli::parse();
  let state_dir = cli.state_dir.unwrap_or_else(default_state_dir);

  match cli.command {
    Commands::Apply { file } => cmd::cmd_apply(&file, &state_dir),
    Commands::Plan { file } => cmd::cmd_plan(&file, &state_dir),
    Commands::Destroy { file } => cmd::cmd_destroy(&file, &state_dir),
    Commands::Status => cmd::cmd_status(&state_dir),
  }
}

fn default_state_dir() -> PathBuf {
  std::env::var_os("LINSCRIPT_STATE_DIR")
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from(".linscript/state"))
}
