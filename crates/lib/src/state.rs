//! Resource state: committed records, staged diffs, and persistence.
//!
//! A [`ScriptRecord`] is the full state of one script resource: its
//! declared configuration plus the computed read bookkeeping. During an
//! apply, [`ResourceData`] holds the committed record (`prior`) next to
//! the staged one (`state`) and answers the diff questions the
//! reconciler and classifier ask: what changed, at element granularity,
//! and how to fall back to the committed values when an apply fails.
//!
//! # Storage layout
//!
//! ```text
//! <state dir>/<resource name>/
//! └── state.json
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::attr;
use crate::resource::ScriptConfig;

/// State file name within a resource directory.
const STATE_FILENAME: &str = "state.json";

/// Full state of one script resource instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRecord {
  pub config: ScriptConfig,

  /// Last value returned by the read command.
  #[serde(default)]
  pub output: String,

  /// True when the most recent read differed from the stored output.
  #[serde(default)]
  pub dirty: bool,

  /// True when the most recent read failed with a command exit error.
  #[serde(default)]
  pub read_failed: bool,

  /// Detail of the last read failure, empty otherwise.
  #[serde(default)]
  pub read_error: String,
}

impl ScriptRecord {
  /// A record with fresh computed fields.
  pub fn new(config: ScriptConfig) -> Self {
    Self {
      config,
      output: String::new(),
      dirty: false,
      read_failed: false,
      read_error: String::new(),
    }
  }
}

/// A record as persisted: the identity minted at create time plus the
/// committed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResource {
  pub id: String,
  pub record: ScriptRecord,
}

/// One resource instance mid-apply: committed state next to staged state.
#[derive(Debug, Clone)]
pub struct ResourceData {
  id: Option<String>,
  prior: ScriptRecord,
  state: ScriptRecord,
}

impl ResourceData {
  /// A resource that has never been created. No identifier, and the
  /// committed record mirrors the desired configuration.
  pub fn new(config: ScriptConfig) -> Self {
    Self {
      id: None,
      prior: ScriptRecord::new(config.clone()),
      state: ScriptRecord::new(config),
    }
  }

  /// An existing resource with a desired configuration staged over it.
  /// Computed fields carry over from the committed record until a read
  /// refreshes them.
  pub fn existing(stored: StoredResource, desired: ScriptConfig) -> Self {
    let state = ScriptRecord {
      config: desired,
      output: stored.record.output.clone(),
      dirty: stored.record.dirty,
      read_failed: stored.record.read_failed,
      read_error: stored.record.read_error.clone(),
    };
    Self {
      id: Some(stored.id),
      prior: stored.record,
      state,
    }
  }

  pub fn id(&self) -> Option<&str> {
    self.id.as_deref()
  }

  /// Commit an identifier; the durable proof that create succeeded.
  pub fn set_id(&mut self, id: String) {
    self.id = Some(id);
  }

  /// Drop the identifier after a successful delete.
  pub fn clear_id(&mut self) {
    self.id = None;
  }

  pub fn prior(&self) -> &ScriptRecord {
    &self.prior
  }

  pub fn state(&self) -> &ScriptRecord {
    &self.state
  }

  pub fn state_mut(&mut self) -> &mut ScriptRecord {
    &mut self.state
  }

  /// The staged record plus identifier, ready for persistence. `None`
  /// while the resource has no identity.
  pub fn to_stored(&self) -> Option<StoredResource> {
    self.id.clone().map(|id| StoredResource {
      id,
      record: self.state.clone(),
    })
  }

  /// Whether the named top-level attribute differs between committed and
  /// staged state.
  pub fn has_change(&self, name: &str) -> bool {
    let (old, new) = (&self.prior, &self.state);
    match name {
      attr::LIFECYCLE_COMMANDS => old.config.lifecycle_commands != new.config.lifecycle_commands,
      attr::TRIGGERS => old.config.triggers != new.config.triggers,
      attr::ENVIRONMENT => old.config.environment != new.config.environment,
      attr::SENSITIVE_ENVIRONMENT => old.config.sensitive_environment != new.config.sensitive_environment,
      attr::INTERPRETER => old.config.interpreter != new.config.interpreter,
      attr::WORKING_DIRECTORY => old.config.working_directory != new.config.working_directory,
      attr::OUTPUT => old.output != new.output,
      attr::DIRTY => old.dirty != new.dirty,
      attr::READ_FAILED => old.read_failed != new.read_failed,
      attr::READ_ERROR => old.read_error != new.read_error,
      _ => false,
    }
  }

  /// Enumerate changed keys at element granularity, optionally filtered
  /// by attribute prefix. Map entries yield `attribute.KEY`, interpreter
  /// entries `interpreter.N`, lifecycle commands
  /// `lifecycle_commands.<phase>`.
  pub fn changed_keys(&self, prefix: &str) -> Vec<String> {
    let (old, new) = (&self.prior, &self.state);
    let mut keys = Vec::new();

    let (oc, nc) = (&old.config.lifecycle_commands, &new.config.lifecycle_commands);
    if oc.create != nc.create {
      keys.push(format!("{}.create", attr::LIFECYCLE_COMMANDS));
    }
    if oc.read != nc.read {
      keys.push(format!("{}.read", attr::LIFECYCLE_COMMANDS));
    }
    if oc.update != nc.update {
      keys.push(format!("{}.update", attr::LIFECYCLE_COMMANDS));
    }
    if oc.delete != nc.delete {
      keys.push(format!("{}.delete", attr::LIFECYCLE_COMMANDS));
    }

    map_changes(attr::TRIGGERS, &old.config.triggers, &new.config.triggers, &mut keys);
    map_changes(
      attr::ENVIRONMENT,
      &old.config.environment,
      &new.config.environment,
      &mut keys,
    );
    map_changes(
      attr::SENSITIVE_ENVIRONMENT,
      &old.config.sensitive_environment,
      &new.config.sensitive_environment,
      &mut keys,
    );

    let entries = old.config.interpreter.len().max(new.config.interpreter.len());
    for index in 0..entries {
      if old.config.interpreter.get(index) != new.config.interpreter.get(index) {
        keys.push(format!("{}.{}", attr::INTERPRETER, index));
      }
    }

    if old.config.working_directory != new.config.working_directory {
      keys.push(attr::WORKING_DIRECTORY.to_string());
    }
    if old.output != new.output {
      keys.push(attr::OUTPUT.to_string());
    }
    if old.dirty != new.dirty {
      keys.push(attr::DIRTY.to_string());
    }
    if old.read_failed != new.read_failed {
      keys.push(attr::READ_FAILED.to_string());
    }
    if old.read_error != new.read_error {
      keys.push(attr::READ_ERROR.to_string());
    }

    keys.retain(|key| matches_prefix(key, prefix));
    keys
  }

  /// True when any declared (non-computed) attribute is staged with a
  /// different value than the committed one.
  pub fn has_config_change(&self) -> bool {
    self.prior.config != self.state.config
  }

  /// Copy committed values back over the staged record, except for the
  /// named attributes. Used when an apply must not carry a staged diff
  /// forward (command-body changes, failed updates).
  pub fn restore_prior(&mut self, except: &[&str]) {
    for &name in attr::RESTORABLE {
      if except.contains(&name) {
        continue;
      }
      match name {
        attr::LIFECYCLE_COMMANDS => {
          self.state.config.lifecycle_commands = self.prior.config.lifecycle_commands.clone();
        }
        attr::ENVIRONMENT => {
          self.state.config.environment = self.prior.config.environment.clone();
        }
        attr::SENSITIVE_ENVIRONMENT => {
          self.state.config.sensitive_environment = self.prior.config.sensitive_environment.clone();
        }
        attr::INTERPRETER => {
          self.state.config.interpreter = self.prior.config.interpreter.clone();
        }
        attr::WORKING_DIRECTORY => {
          self.state.config.working_directory = self.prior.config.working_directory.clone();
        }
        attr::OUTPUT => self.state.output = self.prior.output.clone(),
        attr::DIRTY => self.state.dirty = self.prior.dirty,
        attr::READ_FAILED => self.state.read_failed = self.prior.read_failed,
        attr::READ_ERROR => self.state.read_error = self.prior.read_error.clone(),
        _ => {}
      }
    }
  }
}

fn matches_prefix(key: &str, prefix: &str) -> bool {
  prefix.is_empty() || key == prefix || (key.starts_with(prefix) && key[prefix.len()..].starts_with('.'))
}

fn map_changes(name: &str, old: &BTreeMap<String, String>, new: &BTreeMap<String, String>, keys: &mut Vec<String>) {
  let union: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
  for key in union {
    if old.get(key) != new.get(key) {
      keys.push(format!("{name}.{key}"));
    }
  }
}

/// Errors that can occur when working with persisted resource state.
#[derive(Debug, Error)]
pub enum StateError {
  #[error("failed to read resource state: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write resource state: {0}")]
  Write(#[source] io::Error),

  #[error("failed to create resource state directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to parse resource state: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize resource state: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to remove resource state: {0}")]
  Remove(#[source] io::Error),

  #[error("failed to list resource state: {0}")]
  List(#[source] io::Error),
}

/// Per-resource state persistence under a root directory.
#[derive(Debug, Clone)]
pub struct StateStore {
  root: PathBuf,
}

impl StateStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn resource_dir(&self, name: &str) -> PathBuf {
    self.root.join(name)
  }

  fn state_path(&self, name: &str) -> PathBuf {
    self.resource_dir(name).join(STATE_FILENAME)
  }

  /// Save resource state. Atomic: written to a temp file, then renamed.
  pub fn save(&self, name: &str, stored: &StoredResource) -> Result<(), StateError> {
    let dir = self.resource_dir(name);
    let path = dir.join(STATE_FILENAME);

    debug!(resource = name, path = %path.display(), "saving resource state");

    fs::create_dir_all(&dir).map_err(StateError::CreateDir)?;
    let content = serde_json::to_string_pretty(stored).map_err(StateError::Serialize)?;

    let temp_path = dir.join("state.json.tmp");
    fs::write(&temp_path, &content).map_err(StateError::Write)?;
    fs::rename(&temp_path, &path).map_err(StateError::Write)?;

    info!(resource = name, id = %stored.id, "resource state saved");
    Ok(())
  }

  /// Load resource state. Returns `Ok(None)` when the resource was never
  /// created or its state was already cleaned up.
  pub fn load(&self, name: &str) -> Result<Option<StoredResource>, StateError> {
    let path = self.state_path(name);

    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(resource = name, "no resource state on disk");
        return Ok(None);
      }
      Err(e) => return Err(StateError::Read(e)),
    };

    let stored: StoredResource = serde_json::from_str(&content).map_err(StateError::Parse)?;
    debug!(resource = name, id = %stored.id, "resource state loaded");
    Ok(Some(stored))
  }

  /// Remove resource state after a successful delete. Silently succeeds
  /// when the directory is already gone.
  pub fn remove(&self, name: &str) -> Result<(), StateError> {
    let dir = self.resource_dir(name);
    match fs::remove_dir_all(&dir) {
      Ok(()) => {
        info!(resource = name, "resource state removed");
        Ok(())
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(StateError::Remove(e)),
    }
  }

  /// Names of all resources with persisted state.
  pub fn list(&self) -> Result<Vec<String>, StateError> {
    let entries = match fs::read_dir(&self.root) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(StateError::List(e)),
    };

    let mut names = Vec::new();
    for entry in entries {
      let entry = entry.map_err(StateError::List)?;
      if entry.path().join(STATE_FILENAME).is_file() {
        names.push(entry.file_name().to_string_lossy().to_string());
      }
    }
    names.sort();
    Ok(names)
  }
}
