//! Implementation of the `linscript plan` command.

use std::path::Path;

use anyhow::{Context, Result};
use linscript_lib::apply::{PlanAction, ResourceFile, plan};
use linscript_lib::state::StateStore;
use owo_colors::{OwoColorize, Stream};

use crate::output::{print_info, symbols};

/// Execute the plan command.
///
/// Classifies every resource in the file against persisted state and
/// prints the action an apply would take, without running any command.
pub fn cmd_plan(file: &Path, state_dir: &Path) -> Result<()> {
  let resources = ResourceFile::load(file)?;
  let store = StateStore::new(state_dir);

  let actions = plan(&store, &resources).context("Plan failed")?;

  let mut changes = 0;
  for (name, action) in &actions {
    match action {
      PlanAction::Create => {
        changes += 1;
        println!(
          "  {} {} (create)",
          symbols::ADD.if_supports_color(Stream::Stdout, |s| s.green()),
          name
        );
      }
      PlanAction::Replace(keys) => {
        changes += 1;
        println!(
          "  {} {} (replace, forced by: {})",
          symbols::REMOVE.if_supports_color(Stream::Stdout, |s| s.red()),
          name,
          keys.join(", ")
        );
      }
      PlanAction::Update => {
        changes += 1;
        println!(
          "  {} {} (update in place)",
          symbols::MODIFY.if_supports_color(Stream::Stdout, |s| s.yellow()),
          name
        );
      }
      PlanAction::DeferCommandChange => {
        changes += 1;
        println!(
          "  {} {} (commit changed commands, no execution)",
          symbols::MODIFY.if_supports_color(Stream::Stdout, |s| s.yellow()),
          name
        );
      }
      PlanAction::Refresh => {
        println!("    {} (refresh only)", name);
      }
      PlanAction::Destroy => {
        changes += 1;
        println!(
          "  {} {} (destroy, removed from file)",
          symbols::REMOVE.if_supports_color(Stream::Stdout, |s| s.red()),
          name
        );
      }
    }
  }

  println!();
  if changes == 0 {
    print_info("No changes; apply would only refresh");
  } else {
    print_info(&format!("Apply would make {} change(s)", changes));
  }

  Ok(())
}
