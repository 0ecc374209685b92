//! Implementation of the `linscript destroy` command.

use std::path::Path;

use anyhow::{Context, Result};
use linscript_lib::apply::{ResourceFile, destroy_all};
use linscript_lib::state::StateStore;
use linscript_transport::LocalSession;

use crate::output::{print_stat, print_success};

/// Execute the destroy command.
///
/// Runs the delete command of every resource with persisted state, using
/// the commands each resource was created with, and removes its state.
/// The resource file is only consulted for connection settings; a missing
/// file means default settings.
pub fn cmd_destroy(file: &Path, state_dir: &Path) -> Result<()> {
  let resources = if file.exists() {
    ResourceFile::load(file)?
  } else {
    ResourceFile::default()
  };
  let session = LocalSession::from_config(&resources.connection);
  let store = StateStore::new(state_dir);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(destroy_all(&session, &store)).context("Destroy failed")?;

  println!();
  print_success("Destroy complete");
  print_stat("Destroyed", &report.destroyed.len().to_string());

  Ok(())
}
