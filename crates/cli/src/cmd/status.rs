//! Implementation of the `linscript status` command.

use std::path::Path;

use anyhow::Result;
use linscript_lib::state::StateStore;

use crate::output::{print_info, print_stat, truncate_id};

/// Execute the status command.
///
/// Lists every resource with persisted state along with its identifier
/// and read bookkeeping.
pub fn cmd_status(state_dir: &Path) -> Result<()> {
  let store = StateStore::new(state_dir);
  let names = store.list()?;

  if names.is_empty() {
    print_info("No resources in state");
    return Ok(());
  }

  for name in names {
    let Some(stored) = store.load(&name)? else { continue };
    println!("{}", name);
    print_stat("Id", truncate_id(&stored.id));
    print_stat("Output bytes", &stored.record.output.len().to_string());
    print_stat("Dirty", &stored.record.dirty.to_string());
    if stored.record.read_failed {
      print_stat("Read failed", &stored.record.read_error);
    }
  }

  Ok(())
}
