//! Implementation of the `linscript apply` command.

use std::path::Path;

use anyhow::{Context, Result};
use linscript_lib::apply::{ResourceFile, apply};
use linscript_lib::state::StateStore;
use linscript_transport::LocalSession;
use tracing::info;

use crate::output::{print_stat, print_success};

/// Execute the apply command.
///
/// Loads the resource file, reconciles every resource against persisted
/// state (create, replace, update, or refresh), destroys resources that
/// were removed from the file, and prints a summary of what was done.
pub fn cmd_apply(file: &Path, state_dir: &Path) -> Result<()> {
  let resources = ResourceFile::load(file)?;
  let session = LocalSession::from_config(&resources.connection);
  let store = StateStore::new(state_dir);

  info!(file = %file.display(), resources = resources.resources.len(), "applying resource file");

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(apply(&session, &store, &resources)).context("Apply failed")?;

  println!();
  print_success("Apply complete");
  print_stat("Created", &report.created.len().to_string());
  print_stat("Replaced", &report.replaced.len().to_string());
  print_stat("Updated", &report.updated.len().to_string());
  print_stat("Commands committed", &report.deferred.len().to_string());
  print_stat("Refreshed", &report.refreshed.len().to_string());
  print_stat("Destroyed", &report.destroyed.len().to_string());

  Ok(())
}
