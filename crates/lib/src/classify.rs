//! Pre-execution change classification.
//!
//! Inspects a staged diff before anything runs and decides, per changed
//! attribute, whether the change is updatable in place, must force full
//! replacement, or is illegal to combine with other simultaneous
//! changes. Pure; never touches the session.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

use crate::attr;
use crate::state::ResourceData;

/// Outcome of classifying a staged diff.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Classification {
  replace: BTreeSet<String>,
}

impl Classification {
  /// True when the next apply must destroy and recreate the resource.
  pub fn requires_replacement(&self) -> bool {
    !self.replace.is_empty()
  }

  /// Attributes marked as forcing replacement.
  pub fn replace_keys(&self) -> &BTreeSet<String> {
    &self.replace
  }

  fn mark(&mut self, name: &str) {
    self.replace.insert(name.to_string());
  }
}

/// Classification failures, reported before any execution.
#[derive(Debug, Error)]
pub enum ClassifyError {
  /// Command bodies must change alone; combining them with other
  /// attribute changes in one apply is a configuration error.
  #[error(
    "update to `lifecycle_commands` should not be combined with update to other arguments: {}",
    keys.join(",")
  )]
  CommandChangeConflict { keys: Vec<String> },
}

/// Classify the staged diff of one resource.
///
/// Rules, in priority order:
/// 1. not yet created: nothing to classify
/// 2. command bodies changed: no other attribute may change alongside
///    them (read bookkeeping excepted); the reconciler will defer
/// 3. the last read failed: force replacement unconditionally — a host
///    that cannot be read is not safely updatable in place
/// 4. an update command is configured: everything updates in place
/// 5. otherwise every changed attribute forces replacement, whole-map /
///    whole-list for element-level changes; trigger changes always force
///    replacement regardless of rules 4 and 5
pub fn classify(data: &ResourceData) -> Result<Classification, ClassifyError> {
  let mut classification = Classification::default();

  if data.id().is_none() {
    return Ok(classification); // no state yet
  }

  if data.has_change(attr::LIFECYCLE_COMMANDS) {
    let forbidden: Vec<String> = data
      .changed_keys("")
      .into_iter()
      .filter(|key| {
        !key.starts_with(attr::LIFECYCLE_COMMANDS)
          && !key.starts_with(attr::READ_ERROR)
          && !key.starts_with(attr::READ_FAILED)
      })
      .collect();
    if !forbidden.is_empty() {
      return Err(ClassifyError::CommandChangeConflict { keys: forbidden });
    }
    // Changed commands alone: the update step handles the deferral.
    return Ok(classification);
  }

  // Triggers are immutable by design; any change replaces the resource
  // no matter what the remaining rules say.
  if data.has_change(attr::TRIGGERS) {
    classification.mark(attr::TRIGGERS);
  }

  if data.prior().read_failed {
    // Read failed but the commands did not change: force recreation.
    classification.mark(attr::READ_FAILED);
    return Ok(classification);
  }

  if data.state().config.update_command().is_some() {
    debug!("update command configured; changes are updatable in place");
    return Ok(classification);
  }

  for key in data.changed_keys("") {
    if key_within(&key, attr::TRIGGERS) {
      continue; // already marked above
    }
    classification.mark(collapse_element_key(&key));
  }

  Ok(classification)
}

/// Collapse an element-level key to its whole attribute: a change to one
/// member of a map or list replaces the whole attribute, never just the
/// member.
fn collapse_element_key(key: &str) -> &str {
  for name in [attr::ENVIRONMENT, attr::SENSITIVE_ENVIRONMENT, attr::INTERPRETER] {
    if key_within(key, name) {
      return name;
    }
  }
  key
}

fn key_within(key: &str, name: &str) -> bool {
  key == name || (key.starts_with(name) && key[name.len()..].starts_with('.'))
}
